//! Cooperative progress reporting. There is no cancellation: a query that
//! has started runs to completion.

/// Receives progress updates while a query runs
pub trait ProgressObserver {
    /// `percent` is in `0..=100`
    fn report(&self, percent: u8, status: &str);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8, &str),
{
    fn report(&self, percent: u8, status: &str) {
        self(percent, status);
    }
}

/// Boxed observer, as stored by the engine
pub type ProgressCallback<'a> = Box<dyn ProgressObserver + 'a>;

/// Percentage for `done` of `total` steps, mapped into `start..=end`
pub(crate) fn scaled(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 || end <= start {
        return end;
    }
    let span = usize::from(end - start);
    let step = span * done.min(total) / total;
    start + step as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closure_observer() {
        let seen = RefCell::new(Vec::new());
        let observer = |percent: u8, status: &str| seen.borrow_mut().push((percent, status.to_string()));
        observer.report(50, "halfway");
        assert_eq!(seen.borrow().as_slice(), &[(50, "halfway".to_string())]);
    }

    #[test]
    fn test_scaled() {
        assert_eq!(scaled(10, 90, 0, 4), 10);
        assert_eq!(scaled(10, 90, 2, 4), 50);
        assert_eq!(scaled(10, 90, 4, 4), 90);
        assert_eq!(scaled(10, 90, 0, 0), 90);
    }
}
