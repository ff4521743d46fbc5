//! # Calibration
//!
//! Field calibration of the pitch CV input. The user patches a known voltage into the CV input for each of three
//! steps and confirms each one with a press-and-release of the tap button. The readings are turned into a
//! [`CalibrationCurve`] once all three steps are done.
//!
//! The procedure is entered by holding the tap button at power-up with both switches down. The machine is advanced
//! one control tick at a time by the host loop, which runs nothing else while calibration is active. Every wait is
//! for the user, so by default there is no timeout and an unfinished procedure simply waits forever.

use crate::averager::SampleAverager;
use crate::config::{CalibrationConfig, Capture};
use crate::controls::{ButtonState, PowerUpControls};
use crate::curve::{CalibrationCurve, CalibrationPoint};
use crate::error::CalibrationError;

/// The three reference steps of the procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    One,
    Two,
    Three,
}

impl Step {
    /// `s.index()` is the zero based index of step `s`
    pub fn index(self) -> usize {
        match self {
            Step::One => 0,
            Step::Two => 1,
            Step::Three => 2,
        }
    }

    fn next(self) -> Option<Step> {
        match self {
            Step::One => Some(Step::Two),
            Step::Two => Some(Step::Three),
            Step::Three => None,
        }
    }
}

/// States of the calibration procedure, it only ever moves forward through these
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationState {
    /// The tap button is still held from power-up
    AwaitButtonRelease,
    /// Waiting for the tap button to be pressed to confirm the step
    AwaitRise(Step),
    /// Waiting for the tap button to be released, the input is read on release
    AwaitFall(Step),
    /// Collecting readings for an averaged capture
    Averaging(Step),
    /// All readings are in, the curve is computed on the next tick
    Compute,
    Done,
}

/// How a calibration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationOutcome {
    /// A new valid curve was measured
    Calibrated(CalibrationCurve),
    /// The readings did not give a usable curve
    Rejected(CalibrationError),
    /// The user stopped partway through and the configured timeout expired
    TimedOut,
}

/// The calibration state machine is represented here
pub struct CalibrationStateMachine {
    state: CalibrationState,
    config: CalibrationConfig,
    averager: SampleAverager,
    captured: [u16; 3],
    // ticks spent in the current user wait, only used for the optional timeout
    ticks_waiting: u32,
}

impl CalibrationStateMachine {
    /// `CalibrationStateMachine::new(c)` is a new procedure with config `c`, waiting for the tap button release
    pub fn new(config: CalibrationConfig) -> Self {
        Self::in_state(CalibrationState::AwaitButtonRelease, config)
    }

    /// `CalibrationStateMachine::idle(c)` is a machine that is already done and never calibrates
    pub fn idle(config: CalibrationConfig) -> Self {
        Self::in_state(CalibrationState::Done, config)
    }

    /// `CalibrationStateMachine::at_power_up(p, c)` starts the procedure iff the power-up controls `p` ask for it
    pub fn at_power_up(controls: &PowerUpControls, config: CalibrationConfig) -> Self {
        if controls.requests_calibration() {
            #[cfg(feature = "defmt")]
            defmt::info!("calibration requested at power-up");
            Self::new(config)
        } else {
            Self::idle(config)
        }
    }

    fn in_state(state: CalibrationState, config: CalibrationConfig) -> Self {
        Self {
            state,
            config,
            averager: SampleAverager::new(config.average_count),
            captured: [0; 3],
            ticks_waiting: 0,
        }
    }

    /// `m.state()` is the current state of the procedure
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// `m.is_done()` is true iff the procedure is finished or was never started
    pub fn is_done(&self) -> bool {
        self.state == CalibrationState::Done
    }

    /// `m.tick(t, r)` advances the procedure by one control tick and is the outcome on the tick the run finishes
    ///
    /// # Arguments
    ///
    /// * `tap` - the debounced tap button for this tick
    ///
    /// * `raw_cv` - the raw CV reading for this tick, only used while capturing
    pub fn tick(&mut self, tap: ButtonState, raw_cv: u16) -> Option<CalibrationOutcome> {
        if self.wait_expired() {
            #[cfg(feature = "defmt")]
            defmt::warn!("calibration timed out in {}", self.state);
            self.state = CalibrationState::Done;
            return Some(CalibrationOutcome::TimedOut);
        }

        let next = match self.state {
            CalibrationState::AwaitButtonRelease => {
                if tap.held {
                    CalibrationState::AwaitButtonRelease
                } else {
                    CalibrationState::AwaitRise(Step::One)
                }
            }
            CalibrationState::AwaitRise(step) => {
                if tap.edge.rising {
                    CalibrationState::AwaitFall(step)
                } else {
                    self.state
                }
            }
            CalibrationState::AwaitFall(step) => {
                if tap.edge.falling {
                    self.begin_capture(step, raw_cv)
                } else {
                    self.state
                }
            }
            CalibrationState::Averaging(step) => match self.averager.push(raw_cv) {
                Some(average) => self.record(step, average),
                None => self.state,
            },
            CalibrationState::Compute => {
                self.state = CalibrationState::Done;
                return Some(self.compute());
            }
            CalibrationState::Done => return None,
        };

        if next == self.state {
            self.ticks_waiting = self.ticks_waiting.saturating_add(1);
        } else {
            self.ticks_waiting = 0;
        }
        self.state = next;

        None
    }

    fn wait_expired(&self) -> bool {
        let waiting_on_user = matches!(
            self.state,
            CalibrationState::AwaitButtonRelease
                | CalibrationState::AwaitRise(_)
                | CalibrationState::AwaitFall(_)
        );
        match self.config.timeout_ticks {
            Some(limit) => waiting_on_user && limit <= self.ticks_waiting,
            None => false,
        }
    }

    fn begin_capture(&mut self, step: Step, raw_cv: u16) -> CalibrationState {
        match self.config.captures[step.index()] {
            Capture::Single => self.record(step, raw_cv),
            Capture::Averaged => {
                self.averager.reset();
                match self.averager.push(raw_cv) {
                    Some(average) => self.record(step, average),
                    None => CalibrationState::Averaging(step),
                }
            }
        }
    }

    fn record(&mut self, step: Step, raw_sample: u16) -> CalibrationState {
        #[cfg(feature = "defmt")]
        defmt::info!(
            "calibration step {} at {}V reads {}",
            step.index() + 1,
            self.config.reference_volts[step.index()],
            raw_sample
        );
        self.captured[step.index()] = raw_sample;
        match step.next() {
            Some(step) => CalibrationState::AwaitRise(step),
            None => CalibrationState::Compute,
        }
    }

    fn compute(&self) -> CalibrationOutcome {
        let mut points = [CalibrationPoint {
            reference_volts: 0.0,
            raw_sample: 0,
        }; 3];
        for (i, p) in points.iter_mut().enumerate() {
            p.reference_volts = self.config.reference_volts[i];
            p.raw_sample = self.captured[i];
        }

        match CalibrationCurve::from_points(&points) {
            Ok(curve) => {
                #[cfg(feature = "defmt")]
                defmt::info!(
                    "calibrated: offset {} upv {}",
                    curve.offset,
                    curve.units_per_volt
                );
                CalibrationOutcome::Calibrated(curve)
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("calibration rejected: {}", e);
                CalibrationOutcome::Rejected(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Switch3wayState;
    use crate::gate::TriggerEdge;

    const HELD: ButtonState = ButtonState {
        held: true,
        edge: TriggerEdge {
            rising: false,
            falling: false,
        },
    };
    const RELEASED: ButtonState = ButtonState {
        held: false,
        edge: TriggerEdge {
            rising: false,
            falling: false,
        },
    };
    const PRESS: ButtonState = ButtonState {
        held: false,
        edge: TriggerEdge {
            rising: true,
            falling: false,
        },
    };
    const RELEASE: ButtonState = ButtonState {
        held: false,
        edge: TriggerEdge {
            rising: false,
            falling: true,
        },
    };

    // press and release the tap button for one step, then hold the input at `raw` until the capture completes
    fn confirm_step(m: &mut CalibrationStateMachine, raw: u16) -> Option<CalibrationOutcome> {
        assert_eq!(m.tick(PRESS, raw), None);
        let mut outcome = m.tick(RELEASE, raw);
        while let CalibrationState::Averaging(_) = m.state() {
            outcome = m.tick(RELEASED, raw);
        }
        outcome
    }

    fn started() -> CalibrationStateMachine {
        let mut m = CalibrationStateMachine::new(CalibrationConfig::default());
        m.tick(RELEASED, 0);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::One));
        m
    }

    #[test]
    fn not_requested_at_power_up_means_done() {
        let controls = PowerUpControls {
            top_switch: Switch3wayState::Down,
            bottom_switch: Switch3wayState::Middle,
            tap_pressed: true,
        };
        let mut m = CalibrationStateMachine::at_power_up(&controls, CalibrationConfig::default());
        assert!(m.is_done());
        assert_eq!(m.tick(PRESS, 0), None);
        assert_eq!(m.tick(RELEASE, 0), None);
        assert!(m.is_done());
    }

    #[test]
    fn requested_at_power_up_waits_for_release() {
        let controls = PowerUpControls {
            top_switch: Switch3wayState::Down,
            bottom_switch: Switch3wayState::Down,
            tap_pressed: true,
        };
        let mut m = CalibrationStateMachine::at_power_up(&controls, CalibrationConfig::default());
        assert_eq!(m.state(), CalibrationState::AwaitButtonRelease);

        for _ in 0..50 {
            m.tick(HELD, 0);
        }
        assert_eq!(m.state(), CalibrationState::AwaitButtonRelease);

        m.tick(RELEASED, 0);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::One));
    }

    #[test]
    fn full_run_recovers_reference_curve() {
        let mut m = started();
        assert_eq!(confirm_step(&mut m, 51_436), None);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::Two));
        assert_eq!(confirm_step(&mut m, 38_610), None);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::Three));
        assert_eq!(confirm_step(&mut m, 25_784), None);
        assert_eq!(m.state(), CalibrationState::Compute);

        assert_eq!(
            m.tick(RELEASED, 0),
            Some(CalibrationOutcome::Calibrated(CalibrationCurve::new(
                64_262, 12_826
            )))
        );
        assert!(m.is_done());

        // the outcome is only reported once
        assert_eq!(m.tick(RELEASED, 0), None);
    }

    #[test]
    fn first_step_is_a_single_reading_taken_on_release() {
        let mut m = started();
        m.tick(PRESS, 1);
        m.tick(RELEASE, 51_436);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::Two));
        assert_eq!(m.captured[0], 51_436);
    }

    #[test]
    fn averaged_steps_collect_readings_over_following_ticks() {
        let mut m = started();
        confirm_step(&mut m, 51_436);

        m.tick(PRESS, 0);
        // release tick plus nine more, alternating either side of the true reading
        m.tick(RELEASE, 38_605);
        for i in 0..9 {
            assert_eq!(m.state(), CalibrationState::Averaging(Step::Two));
            let raw = if i % 2 == 0 { 38_615 } else { 38_605 };
            m.tick(RELEASED, raw);
        }
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::Three));
        assert_eq!(m.captured[1], 38_610);
    }

    #[test]
    fn edges_out_of_order_are_ignored() {
        let mut m = started();
        // a release with no press before it does nothing
        m.tick(RELEASE, 51_436);
        assert_eq!(m.state(), CalibrationState::AwaitRise(Step::One));

        m.tick(PRESS, 0);
        // a second press while waiting for the release does nothing either
        m.tick(PRESS, 0);
        assert_eq!(m.state(), CalibrationState::AwaitFall(Step::One));
    }

    #[test]
    fn stalls_forever_without_a_timeout() {
        let mut m = started();
        m.tick(PRESS, 0);
        for _ in 0..100_000 {
            assert_eq!(m.tick(HELD, 0), None);
        }
        assert_eq!(m.state(), CalibrationState::AwaitFall(Step::One));
    }

    #[test]
    fn optional_timeout_abandons_a_stalled_run() {
        let config = CalibrationConfig {
            timeout_ticks: Some(100),
            ..CalibrationConfig::default()
        };
        let mut m = CalibrationStateMachine::new(config);
        m.tick(RELEASED, 0);
        confirm_step(&mut m, 51_436);

        let mut outcome = None;
        let mut ticks = 0;
        while outcome.is_none() {
            outcome = m.tick(RELEASED, 0);
            ticks += 1;
            assert!(ticks <= 101);
        }
        assert_eq!(outcome, Some(CalibrationOutcome::TimedOut));
        assert!(m.is_done());
    }

    #[test]
    fn timeout_restarts_on_each_transition() {
        let config = CalibrationConfig {
            timeout_ticks: Some(20),
            ..CalibrationConfig::default()
        };
        let mut m = CalibrationStateMachine::new(config);
        m.tick(RELEASED, 0);
        for raw in [51_436, 38_610, 25_784] {
            for _ in 0..15 {
                assert_eq!(m.tick(RELEASED, raw), None);
            }
            confirm_step(&mut m, raw);
        }
        assert!(matches!(
            m.tick(RELEASED, 0),
            Some(CalibrationOutcome::Calibrated(_))
        ));
    }

    #[test]
    fn unpatched_input_is_rejected() {
        let mut m = started();
        for _ in 0..3 {
            confirm_step(&mut m, 64_000);
        }
        assert_eq!(
            m.tick(RELEASED, 0),
            Some(CalibrationOutcome::Rejected(CalibrationError::OutOfBand(0)))
        );
        assert!(m.is_done());
    }

    #[test]
    fn all_single_captures_finish_on_release() {
        let config = CalibrationConfig {
            captures: [Capture::Single; 3],
            ..CalibrationConfig::default()
        };
        let mut m = CalibrationStateMachine::new(config);
        m.tick(RELEASED, 0);
        for raw in [51_436, 38_610, 25_784] {
            m.tick(PRESS, 0);
            m.tick(RELEASE, raw);
        }
        assert_eq!(m.state(), CalibrationState::Compute);
    }
}
