//! The remoting root: registry control plane of one reactor system.
//!
//! A system reactor whose children are registry drivers. It answers the
//! bootstrap protocol, publishes the local remoting channels, maintains the
//! routing table from gate events, and heals its own registration when the
//! registry loses it.

use rill_core::{
    ChannelIdPublicationRequest, Payload, ReactorInit, ReactorStop, RegistryDriverInitComplete,
    RegistryGateRemoved, RegistryGateUpserted, RegistrySubscriptionComplete,
    ServiceCancellationRequest, ServicePublicationFailed, ServicePublicationRequest,
    SynchronizationWithServiceRegistryRequest,
};
use rill_runtime::{Gate, ReactorContext, Reactions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Builds the remoting root's reaction table.
///
/// `spurious` counts payloads outside the registry vocabulary; they are an
/// invariant violation but non-fatal, so they are logged at error and
/// counted rather than rate-limited.
pub fn remoting_root_reactions(spurious: Arc<AtomicU64>) -> Reactions {
    Reactions::builder()
        .on::<ReactorInit>(|_ctx, _init: ReactorInit| {})
        .on::<RegistryDriverInitComplete>(|ctx, _done: RegistryDriverInitComplete| {
            ctx.reply(&SynchronizationWithServiceRegistryRequest);
        })
        .on::<RegistrySubscriptionComplete>(|ctx, _sub: RegistrySubscriptionComplete| {
            let sender = ctx.sender();
            let system = ctx.system().clone();
            for driver in system.remoting_drivers() {
                let request = ChannelIdPublicationRequest {
                    system: system.id().clone(),
                    channel: driver.channel_id(),
                    properties: driver.channel_properties(),
                };
                let channel = request.channel.clone();
                sender
                    .tell(ctx.self_ref(), &request)
                    .on_resolved(move |status| {
                        if !status.is_delivered() {
                            tracing::error!(%channel, %status, "unable to publish channel");
                        }
                    });
            }
        })
        .on::<RegistryGateUpserted>(|ctx, upsert: RegistryGateUpserted| {
            // Skip self notifications.
            if &upsert.system == ctx.system().id() {
                return;
            }
            let routes = ctx.system().routes();
            routes.unregister(&upsert.system, &upsert.channel);
            routes.register(
                upsert.system.clone(),
                upsert.channel.clone(),
                Gate::new(upsert.properties.clone()),
            );
            tracing::debug!(
                local = %ctx.system().id(),
                peer = %upsert.system,
                channel = %upsert.channel,
                "route registered from gate upsert"
            );
        })
        .on::<RegistryGateRemoved>(|ctx, removed: RegistryGateRemoved| {
            if &removed.system == ctx.system().id() {
                // Our own entry was lost; trigger a re-publish toward the
                // registry driver that reported it.
                ctx.self_ref()
                    .tell(&ctx.sender(), &RegistrySubscriptionComplete);
                return;
            }
            ctx.system()
                .routes()
                .unregister(&removed.system, &removed.channel);
            tracing::debug!(
                local = %ctx.system().id(),
                peer = %removed.system,
                channel = %removed.channel,
                "route removed from gate removal"
            );
        })
        .on::<ServicePublicationRequest>(|ctx, request: ServicePublicationRequest| {
            fan_out(ctx, &request);
        })
        .on::<ServiceCancellationRequest>(|ctx, request: ServiceCancellationRequest| {
            fan_out(ctx, &request);
        })
        .on::<ServicePublicationFailed>(|_ctx, failure: ServicePublicationFailed| {
            tracing::error!(
                service = %failure.service_name,
                reason = %failure.reason,
                "service publication failed"
            );
        })
        .on::<ReactorStop>(|_ctx, _stop: ReactorStop| {})
        .fallback(move |ctx, env| {
            spurious.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                reactor = %ctx.id(),
                tag = env.tag(),
                "spurious message received by remoting root"
            );
        })
        .build()
}

/// Forwards a request to every registry-driver child, logging delivery
/// failures. Children are captured under the structural read lock at entry.
fn fan_out<P: Payload>(ctx: &ReactorContext, request: &P) {
    for child in ctx.children() {
        let child_id = child.id().clone();
        child.tell(ctx.self_ref(), request).on_resolved(move |status| {
            if !status.is_delivered() {
                tracing::error!(
                    registry_driver = %child_id,
                    %status,
                    "unable to deliver registry request"
                );
            }
        });
    }
}
