//! Selection of the damping factor `t` for the update `mu <- mu + t x`

/// The result of a single damping search
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DampingOutcome {
    /// The selected damping factor, always within `[t_min, 1]`
    pub damping: f64,
    /// True when the search fell through to `t_min` without finding an acceptable step
    pub forced: bool,
    /// True when the floor has reached one and the search still collapsed onto it
    pub stalled: bool,
}

/// Bounded multiplicative search over the damping factor
///
/// Each search starts from the previous selection divided by the ratio. When that start is
/// acceptable the factor grows towards one, otherwise it shrinks towards the floor. Two
/// consecutive selections at the floor double it.
#[derive(Clone, Debug)]
pub struct DampingSchedule {
    ratio: f64,
    floor: f64,
    previous: f64,
    consecutive_collapses: usize,
}

impl DampingSchedule {
    pub fn new(ratio: f64, floor: f64) -> Self {
        let floor = floor.clamp(f64::MIN_POSITIVE, 1_f64);
        Self {
            ratio,
            floor,
            previous: floor,
            consecutive_collapses: 0,
        }
    }

    /// The current floor `t_min`
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// The last selected damping factor
    pub fn previous(&self) -> f64 {
        self.previous
    }

    /// Select the largest damping factor accepted by `acceptable`
    ///
    /// When shrinking, the floor itself is not evaluated. The search settles on it once every
    /// larger trial has been rejected.
    pub fn select<E>(
        &mut self,
        mut acceptable: impl FnMut(f64) -> Result<bool, E>,
    ) -> Result<DampingOutcome, E> {
        let start = (self.previous / self.ratio).clamp(self.floor, 1_f64);

        let (damping, forced) = if acceptable(start)? {
            let mut damping = start;
            while damping < 1_f64 {
                let next = (damping / self.ratio).min(1_f64);
                if !acceptable(next)? {
                    break;
                }
                damping = next;
            }
            (damping, false)
        } else {
            let mut trial = start * self.ratio;
            loop {
                if trial <= self.floor {
                    break (self.floor, true);
                }
                if acceptable(trial)? {
                    break (trial, false);
                }
                trial *= self.ratio;
            }
        };

        let mut stalled = false;
        if damping <= self.floor {
            self.consecutive_collapses += 1;
        } else {
            self.consecutive_collapses = 0;
        }
        if self.consecutive_collapses >= 2 {
            if self.floor >= 1_f64 {
                stalled = forced;
            } else {
                self.floor = (2_f64 * self.floor).min(1_f64);
                tracing::warn!(
                    minimum_damping = self.floor,
                    "Iterator has stalled, doubling the damping floor"
                );
            }
            self.consecutive_collapses = 0;
        }

        self.previous = damping;
        Ok(DampingOutcome {
            damping,
            forced,
            stalled,
        })
    }
}
