//! Middleware chain runner.
//!
//! A middleware receives the context and a [`Next`] continuation for the
//! rest of the chain. It may act before and after awaiting `next.run(ctx)`,
//! or return without calling it to stop the chain. The end of the chain is
//! a no-op.

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::FactoryError;

pub type Middleware<C> =
    for<'a> fn(&'a mut C, Next<'a, C>) -> LocalBoxFuture<'a, Result<(), FactoryError>>;

/// Continuation over the middlewares that have not run yet.
pub struct Next<'a, C> {
    rest: &'a [Middleware<C>],
}

impl<C> Clone for Next<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Next<'_, C> {}

impl<'a, C> Next<'a, C> {
    pub fn new(chain: &'a [Middleware<C>]) -> Self {
        Self { rest: chain }
    }

    /// Number of middlewares still to run.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    pub fn run<'b>(self, ctx: &'b mut C) -> LocalBoxFuture<'b, Result<(), FactoryError>>
    where
        'a: 'b,
    {
        match self.rest.split_first() {
            Some((head, rest)) => head(ctx, Next { rest }),
            None => future::ready(Ok(())).boxed_local(),
        }
    }
}

/// Run `chain` over `ctx`.
pub async fn run_chain<C>(chain: &[Middleware<C>], ctx: &mut C) -> Result<(), FactoryError> {
    Next::new(chain).run(ctx).await
}
