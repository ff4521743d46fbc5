#![no_std]
#![no_main]

mod board;
mod ui;

use crate::board::{Board, Led};

use acid_cv_core::{
    analog_voice::AnalogVoice,
    calibration::{CalibrationState, Step},
    config::Config,
    controller::Controller,
};

use defmt_rtt as _;
use panic_halt as _;

use cortex_m_rt::entry;

const VOICE_SR: f32 = board::TIM2_FREQ_HZ as f32;

/// The control logic runs once every this many voice ticks
const CONTROL_DIVIDER: u32 = 5;

/// Let the panel and input buffers settle before reading the power-up controls
const POWER_UP_SETTLE_MS: u32 = 10;

#[entry]
fn main() -> ! {
    let (mut board, calibration_flash) = Board::init();

    board.delay_ms(POWER_UP_SETTLE_MS);
    let power_up = ui::Ui::power_up(&mut board);
    let mut ui = ui::Ui::new(&power_up);

    let mut controller = Controller::new(calibration_flash, Config::default(), power_up);
    let mut voice = AnalogVoice::new(VOICE_SR);
    controller.init_voice(&mut voice);

    defmt::info!(
        "acid-cv running, mode {}, calibrating {}",
        controller.mode(),
        controller.is_calibrating()
    );

    let mut control_counter = 0;

    loop {
        if board.tim2_timeout() {
            board.set_debug_pin(true);

            ////////////////////////////////////////////////////////////////////
            //
            // Control rate
            //
            ////////////////////////////////////////////////////////////////////

            control_counter += 1;
            if CONTROL_DIVIDER <= control_counter {
                control_counter = 0;

                let frame = ui.update(&mut board);
                controller.tick(&frame, &mut voice);

                ////////////////////////////////////////////////////////////////
                //
                // LEDs
                //
                ////////////////////////////////////////////////////////////////

                let step = match controller.calibration_state() {
                    CalibrationState::AwaitRise(s)
                    | CalibrationState::AwaitFall(s)
                    | CalibrationState::Averaging(s) => Some(s),
                    _ => None,
                };
                board.set_led(Led::CalStep1, step == Some(Step::One));
                board.set_led(Led::CalStep2, step == Some(Step::Two));
                board.set_led(Led::CalStep3, step == Some(Step::Three));
                board.set_led(Led::Gate, frame.gate);
            }

            ////////////////////////////////////////////////////////////////////
            //
            // Voice rate
            //
            ////////////////////////////////////////////////////////////////////

            let out = voice.tick();
            board.write_voice(&out);

            board.set_debug_pin(false);
        }
    }
}
