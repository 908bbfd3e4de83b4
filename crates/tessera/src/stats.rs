//! # Frame Statistics
//!
//! One [`FrameStats`] per frame, folded into a [`FrameStatsAccumulator`]
//! for the run summary.

use std::time::Duration;

use tessera_core::FlushStats;

/// Timing of one frame, per phase, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// Whole frame.
    pub total_us: u64,
    /// Begin phase.
    pub begin_us: u64,
    /// Input phase.
    pub input_us: u64,
    /// Update phase, including its flush.
    pub update_us: u64,
    /// Draw phase.
    pub draw_us: u64,
    /// End phase, including its flush.
    pub end_us: u64,
    /// Allocated entities after the frame.
    pub entities: usize,
    /// Structural changes applied during the frame.
    pub flush: FlushStats,
}

/// Whole microseconds in `duration`, saturating.
#[must_use]
pub fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Running totals over many frames.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Frames recorded.
    pub frames_recorded: u64,
    /// Sum of frame times.
    pub total_us_sum: u64,
    /// Sum of update phase times.
    pub update_us_sum: u64,
    /// Sum of draw phase times.
    pub draw_us_sum: u64,
    /// Fastest frame.
    pub min_frame_us: u64,
    /// Slowest frame.
    pub max_frame_us: u64,
    /// Frames slower than the budget.
    pub frames_over_budget: u64,
    /// Entities created over the run.
    pub entities_created: usize,
    /// Entities destroyed over the run.
    pub entities_destroyed: usize,
    budget_us: u64,
}

impl FrameStatsAccumulator {
    /// Creates an accumulator measuring against `budget`.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            update_us_sum: 0,
            draw_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            entities_created: 0,
            entities_destroyed: 0,
            budget_us: micros(budget),
        }
    }

    /// Folds in one frame.
    pub fn record(&mut self, stats: &FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.update_us_sum += stats.update_us;
        self.draw_us_sum += stats.draw_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.entities_created += stats.flush.created;
        self.entities_destroyed += stats.flush.destroyed;

        if stats.total_us > self.budget_us {
            self.frames_over_budget += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn average_ms(&self, sum_us: u64) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        self.average_ms(self.total_us_sum)
    }

    /// Average frames per second.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Prints a summary to stdout.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        println!("=== FRAME STATISTICS ===");
        println!("Frames recorded:  {}", self.frames_recorded);
        println!("Average frame:    {:.3} ms ({:.1} FPS)", self.avg_frame_ms(), self.avg_fps());
        if self.frames_recorded > 0 {
            println!("Min frame:        {:.3} ms", self.min_frame_us as f64 / 1000.0);
            println!("Max frame:        {:.3} ms", self.max_frame_us as f64 / 1000.0);
        }
        println!(
            "Over budget:      {} frames ({:.1}%) against {:.3} ms",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0,
            self.budget_us as f64 / 1000.0
        );
        println!("Update (avg):     {:.3} ms", self.average_ms(self.update_us_sum));
        println!("Draw (avg):       {:.3} ms", self.average_ms(self.draw_us_sum));
        println!(
            "Entities:         {} created, {} destroyed",
            self.entities_created, self.entities_destroyed
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new(Duration::from_micros(16_666))
    }
}
