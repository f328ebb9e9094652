//! Reaction tables.
//!
//! A reactor's behavior is a mapping from payload type tags to handlers,
//! plus a wildcard fallback for anything unmapped. Tags are precomputed at
//! send time, so lookup is a plain map access. Handlers are the only code
//! that runs under the reactor's identity; they receive the owning
//! [`ReactorContext`] and the decoded payload.
//!
//! # Examples
//!
//! ```ignore
//! let reactions = Reactions::builder()
//!     .on::<String>(|ctx, text| {
//!         ctx.reply(&text.to_uppercase());
//!     })
//!     .fallback(|_ctx, env| tracing::debug!(tag = env.tag(), "ignored"))
//!     .build();
//! ```

use crate::context::ReactorContext;
use rill_core::{Envelope, Payload};
use std::collections::HashMap;

type Handler = Box<dyn FnMut(&ReactorContext, &Envelope) + Send>;

/// Tag-indexed handler table with a wildcard fallback.
pub struct Reactions {
    by_tag: HashMap<&'static str, Handler>,
    fallback: Handler,
}

impl Reactions {
    /// Starts building a reaction table.
    pub fn builder() -> ReactionsBuilder {
        ReactionsBuilder {
            by_tag: HashMap::new(),
            fallback: None,
        }
    }

    /// An empty table: every message falls through to the default fallback.
    pub fn ignore_all() -> Self {
        Self::builder().build()
    }

    pub(crate) fn handle(&mut self, ctx: &ReactorContext, env: &Envelope) {
        match self.by_tag.get_mut(env.tag()) {
            Some(handler) => handler(ctx, env),
            None => (self.fallback)(ctx, env),
        }
    }
}

/// Builder for [`Reactions`].
pub struct ReactionsBuilder {
    by_tag: HashMap<&'static str, Handler>,
    fallback: Option<Handler>,
}

impl ReactionsBuilder {
    /// Registers a typed handler for payloads of type `P`.
    ///
    /// Payload bytes that fail to decode as `P` are logged and dropped; the
    /// reactor moves on to the next message.
    pub fn on<P: Payload>(
        mut self,
        mut handler: impl FnMut(&ReactorContext, P) + Send + 'static,
    ) -> Self {
        self.by_tag.insert(
            P::tag(),
            Box::new(move |ctx, env| match env.payload::<P>() {
                Ok(payload) => handler(ctx, payload),
                Err(error) => tracing::error!(
                    reactor = %ctx.id(),
                    tag = env.tag(),
                    %error,
                    "dropping payload that failed to decode"
                ),
            }),
        );
        self
    }

    /// Registers the wildcard handler for unmapped tags.
    ///
    /// Without one, unmapped messages are logged at debug and dropped.
    pub fn fallback(
        mut self,
        handler: impl FnMut(&ReactorContext, &Envelope) + Send + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Finishes the table.
    pub fn build(self) -> Reactions {
        Reactions {
            by_tag: self.by_tag,
            fallback: self.fallback.unwrap_or_else(|| {
                Box::new(|ctx, env| {
                    tracing::debug!(
                        reactor = %ctx.id(),
                        tag = env.tag(),
                        "no reaction registered, message dropped"
                    );
                })
            }),
        }
    }
}
