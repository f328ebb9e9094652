//! Registry driver backed by a [`DirectoryBoard`].
//!
//! One driver reactor per board, spawned as a child of the remoting root.
//! It speaks the registry bootstrap protocol with its parent and mirrors
//! board events upward:
//!
//! 1. on init it subscribes to the board and reports
//!    `RegistryDriverInitComplete`
//! 2. the root answers with a synchronization request
//! 3. the driver replays the current gate set and reports
//!    `RegistrySubscriptionComplete`
//! 4. the root publishes the local channels, which the driver upserts into
//!    the board

use crate::board::DirectoryBoard;
use rill_core::{
    ChannelIdPublicationRequest, ReactorInit, ReactorStop, RegistryDriverInitComplete,
    RegistryGateRemoved, RegistryGateUpserted, RegistrySubscriptionComplete,
    ServiceCancellationRequest, ServicePublicationFailed, ServicePublicationRequest,
    SynchronizationWithServiceRegistryRequest,
};
use rill_runtime::Reactions;

/// Reaction table for a directory registry driver.
pub fn directory_registry_reactions(board: DirectoryBoard) -> Reactions {
    let on_init = board.clone();
    let on_sync = board.clone();
    let on_publication = board.clone();
    let on_service = board.clone();
    let on_cancel = board.clone();
    let on_stop = board;

    Reactions::builder()
        .on::<ReactorInit>(move |ctx, _init: ReactorInit| {
            on_init.subscribe(ctx.self_ref().clone());
            ctx.parent()
                .tell(ctx.self_ref(), &RegistryDriverInitComplete);
        })
        .on::<SynchronizationWithServiceRegistryRequest>(
            move |ctx, _sync: SynchronizationWithServiceRegistryRequest| {
                for (system, channel, properties) in on_sync.gates() {
                    ctx.parent().tell(
                        ctx.self_ref(),
                        &RegistryGateUpserted {
                            system,
                            channel,
                            properties,
                        },
                    );
                }
                ctx.parent()
                    .tell(ctx.self_ref(), &RegistrySubscriptionComplete);
            },
        )
        .on::<ChannelIdPublicationRequest>(move |_ctx, publication: ChannelIdPublicationRequest| {
            on_publication.upsert_gate(
                publication.system,
                publication.channel,
                publication.properties,
            );
        })
        .on::<ServicePublicationRequest>(move |ctx, request: ServicePublicationRequest| {
            if let Err(reason) = on_service.publish_service(
                &request.service_name,
                request.service_gate,
                request.properties,
            ) {
                ctx.parent().tell(
                    ctx.self_ref(),
                    &ServicePublicationFailed {
                        service_name: request.service_name,
                        reason,
                    },
                );
            }
        })
        .on::<ServiceCancellationRequest>(move |_ctx, request: ServiceCancellationRequest| {
            on_cancel.cancel_service(&request.service_name);
        })
        .on::<RegistryGateUpserted>(|ctx, event: RegistryGateUpserted| {
            // Board broadcast; surface it to our remoting root.
            ctx.parent().tell(ctx.self_ref(), &event);
        })
        .on::<RegistryGateRemoved>(|ctx, event: RegistryGateRemoved| {
            ctx.parent().tell(ctx.self_ref(), &event);
        })
        .on::<ReactorStop>(move |ctx, _stop: ReactorStop| {
            on_stop.unsubscribe(ctx.self_ref());
            on_stop.remove_system_gates(ctx.system().id());
        })
        .build()
}
