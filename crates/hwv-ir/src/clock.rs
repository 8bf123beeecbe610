//! Clock edge detection and reset tracking
//!
//! Both work over any [`Domain`], so the same rules drive concrete
//! simulation and symbolic model checking. A previous sample of `None` is an
//! unknown (X) value: a rising edge fires on X->1, a falling edge on X->0.

use crate::domain::Domain;
use crate::property::ClockEdge;

/// Whether `edge` fires for the transition `prev -> curr`
pub fn edge_fires<D: Domain>(
    dom: &mut D,
    edge: ClockEdge,
    prev: Option<&D::Bit>,
    curr: &D::Bit,
) -> D::Bit {
    match (edge, prev) {
        (ClockEdge::Pos, None) => curr.clone(),
        (ClockEdge::Pos, Some(p)) => {
            let np = dom.not(p);
            dom.and(&np, curr)
        }
        (ClockEdge::Neg, None) => dom.not(curr),
        (ClockEdge::Neg, Some(p)) => {
            let nc = dom.not(curr);
            dom.and(p, &nc)
        }
        (ClockEdge::Both, None) => dom.constant(true),
        (ClockEdge::Both, Some(p)) => dom.xor(p, curr),
    }
}

/// Hidden state of one `HasBeenReset` node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetLatch<B> {
    /// Reset has been observed asserted
    pub seen: B,
    /// Reset has been observed released after `seen`; sticky
    pub done: B,
    /// Clock value at the previous evaluation
    pub prev_clock: Option<B>,
}

impl<B: Clone> ResetLatch<B> {
    pub fn cleared<D: Domain<Bit = B>>(dom: &mut D) -> Self {
        Self {
            seen: dom.constant(false),
            done: dom.constant(false),
            prev_clock: None,
        }
    }

    /// Advance the latch by one evaluation and return the new state; the
    /// node's value is the new `done`.
    pub fn update<D: Domain<Bit = B>>(
        &self,
        dom: &mut D,
        async_reset: bool,
        clock: &B,
        reset: &B,
    ) -> Self {
        let rising = edge_fires(dom, ClockEdge::Pos, self.prev_clock.as_ref(), clock);

        // Release is only recognised on a clock edge, after reset was seen
        let not_reset = dom.not(reset);
        let released = dom.and(&rising, &not_reset);
        let released = dom.and(&released, &self.seen);
        let done = dom.or(&self.done, &released);

        let assert_now = if async_reset {
            reset.clone()
        } else {
            dom.and(&rising, reset)
        };
        let seen = dom.or(&self.seen, &assert_now);

        Self {
            seen,
            done,
            prev_clock: Some(clock.clone()),
        }
    }
}
