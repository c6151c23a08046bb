/// How many steps of a subtask are shown, bounded to `0..=total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealSteps {
    revealed: usize,
    total: usize,
}

impl RevealSteps {
    pub fn new(total: usize) -> Self {
        Self { revealed: 0, total }
    }

    /// Start with `revealed` steps shown, clamped to `total`.
    pub fn with_revealed(total: usize, revealed: usize) -> Self {
        Self {
            revealed: revealed.min(total),
            total,
        }
    }

    /// Reveal one more step. Returns the new count.
    pub fn advance(&mut self) -> usize {
        self.revealed = (self.revealed + 1).min(self.total);
        self.revealed
    }

    pub fn reset(&mut self) {
        self.revealed = 0;
    }

    pub fn reveal_all(&mut self) {
        self.revealed = self.total;
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn hidden(&self) -> usize {
        self.total - self.revealed
    }

    pub fn is_complete(&self) -> bool {
        self.revealed == self.total
    }

    pub fn has_started(&self) -> bool {
        self.revealed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_saturates() {
        let mut reveal = RevealSteps::new(2);
        assert!(!reveal.has_started());
        assert_eq!(reveal.advance(), 1);
        assert_eq!(reveal.advance(), 2);
        assert_eq!(reveal.advance(), 2);
        assert!(reveal.is_complete());
        assert_eq!(reveal.hidden(), 0);
    }

    #[test]
    fn reset_and_reveal_all() {
        let mut reveal = RevealSteps::new(3);
        reveal.reveal_all();
        assert_eq!(reveal.revealed(), 3);
        reveal.reset();
        assert_eq!(reveal.revealed(), 0);
        assert_eq!(reveal.hidden(), 3);
    }

    #[test]
    fn with_revealed_clamps() {
        assert_eq!(RevealSteps::with_revealed(2, 5).revealed(), 2);
    }

    #[test]
    fn zero_steps_is_complete() {
        let mut reveal = RevealSteps::new(0);
        assert!(reveal.is_complete());
        assert_eq!(reveal.advance(), 0);
    }
}
