//! Cooperative yield into the real-time audio routine.

/// Periodic servicing callback invoked during long in-place work.
///
/// Called between bounded work quanta so that audio output is never starved.
/// Must be safe to call arbitrarily often. Implementations must not touch the
/// chunk whose work is being interleaved.
pub trait RealtimeService {
    fn service(&mut self);
}

impl<F: FnMut()> RealtimeService for F {
    #[inline]
    fn service(&mut self) {
        self()
    }
}

/// Servicer for contexts with no audio output running.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoService;

impl RealtimeService for NoService {
    #[inline]
    fn service(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_three(rt: &mut dyn RealtimeService) {
        for _ in 0..3 {
            rt.service();
        }
    }

    #[test]
    fn test_closure_servicer() {
        let mut calls = 0;
        run_three(&mut || calls += 1);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_no_service() {
        run_three(&mut NoService);
    }
}
