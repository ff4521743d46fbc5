use acid_cv_core::{
    analog_voice::VoiceOutput,
    controls::Switch3wayState,
    curve::CalibrationCurve,
    error::StorageError,
    storage::{CalibrationRecord, CalibrationStorage},
};

use stm32l4xx_hal::{
    adc::{SampleTime, ADC},
    delay::Delay,
    device::{ADC1, SPI1, TIM2},
    flash::{FlashPage, WriteErase, CR, KEYR, SR},
    gpio::{Alternate, Analog, Floating, Input, Output, Pin, PullUp, PushPull, H8, L8},
    hal::spi::{Mode, Phase, Polarity},
    prelude::*,
    spi::Spi,
    timer::Timer,
};

/// The physical board structure is represented here
pub struct Board {
    // onboard multiplexer for reading the panel pots, switches, and tap button
    mux: Mux,

    // SPI for DACs and LED driver
    spi: SpiBus,

    adc1: ADC,
    pitch_cv_pin: Pin<Analog, L8, 'A', 0>,

    // the gate input is inverted by the input buffer
    not_ext_gate: Pin<Input<Floating>, H8, 'A', 8>,

    // voice tick timer
    tim2: Timer<TIM2>,

    // general purpose delay
    delay: Delay,

    // binary representation of the LEDs driven by 74HC595 shift register
    led_state: u8,

    // debug pin for misc debug purposes
    debug_pin: Pin<Output<PushPull>, L8, 'B', 0>,
}

impl Board {
    /// `Board::init()` is the board structure with all peripherals initialized, and the calibration flash store
    pub fn init() -> (Self, CalibrationFlash) {
        ////////////////////////////////////////////////////////////////////////
        //
        // general peripheral housekeeping, core peripherals and clocks
        //
        ////////////////////////////////////////////////////////////////////////
        let cp = cortex_m::Peripherals::take().unwrap();
        let dp = stm32l4xx_hal::pac::Peripherals::take().unwrap();
        let mut flash = dp.FLASH.constrain();
        let mut rcc = dp.RCC.constrain();
        let mut pwr = dp.PWR.constrain(&mut rcc.apb1r1);

        let clocks = rcc
            .cfgr
            .sysclk(SYST_CLK_FREQ_MHZ.MHz())
            .pclk1(SYST_CLK_FREQ_MHZ.MHz())
            .pclk2(SYST_CLK_FREQ_MHZ.MHz())
            .freeze(&mut flash.acr, &mut pwr);

        let mut delay = Delay::new(cp.SYST, clocks);

        let mut gpioa = dp.GPIOA.split(&mut rcc.ahb2);
        let mut gpiob = dp.GPIOB.split(&mut rcc.ahb2);

        ////////////////////////////////////////////////////////////////////////
        //
        // Timer
        //
        ////////////////////////////////////////////////////////////////////////

        let tim2 = Timer::tim2(dp.TIM2, TIM2_FREQ_HZ.Hz(), clocks, &mut rcc.apb1r1);

        ////////////////////////////////////////////////////////////////////////
        //
        // ADC
        //
        ////////////////////////////////////////////////////////////////////////

        let mut adc1 = ADC::new(
            dp.ADC1,
            dp.ADC_COMMON,
            &mut rcc.ahb2,
            &mut rcc.ccipr,
            &mut delay,
        );

        adc1.set_sample_time(ADC_SAMPLE_TIME);

        unsafe {
            // configure hardware oversampler for 16 bit resolution
            (*ADC1::ptr()).cfgr2.modify(|_, w| {
                w.ovss()
                    .bits(0b0001) // shift right by 1
                    .ovsr()
                    .bits(0b100) // oversample 32x
                    .rovse()
                    .set_bit()
            });
        }

        let pitch_cv_pin = gpioa.pa0.into_analog(&mut gpioa.moder, &mut gpioa.pupdr);

        ////////////////////////////////////////////////////////////////////////
        //
        // SPI
        //
        ////////////////////////////////////////////////////////////////////////

        let sck = gpiob
            .pb3
            .into_alternate(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrl);
        let sdi = gpiob
            .pb4
            .into_alternate(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrl);
        let sdo = gpiob
            .pb5
            .into_alternate(&mut gpiob.moder, &mut gpiob.otyper, &mut gpiob.afrl);

        let mut spi = SpiBus {
            bus: Spi::spi1(
                dp.SPI1,
                (sck, sdi, sdo),
                Mode {
                    phase: Phase::CaptureOnFirstTransition,
                    polarity: Polarity::IdleHigh,
                },
                SPI_CLK_FREQ_MHZ.MHz(),
                clocks,
                &mut rcc.apb2,
            ),
            chip_sel: (
                gpioa.pa15.into_push_pull_output_in_state(
                    &mut gpioa.moder,
                    &mut gpioa.otyper,
                    PinState::High,
                ),
                gpiob.pb6.into_push_pull_output_in_state(
                    &mut gpiob.moder,
                    &mut gpiob.otyper,
                    PinState::High,
                ),
                gpiob.pb7.into_push_pull_output_in_state(
                    &mut gpiob.moder,
                    &mut gpiob.otyper,
                    PinState::High,
                ),
            ),
        };

        // set the DAC128S085 to WTM mode, so that outputs update after writing to a register
        spi.write(ChipSelect::Cs1, &[0b1001_0000, 0]);

        ////////////////////////////////////////////////////////////////////////
        //
        // MUX
        //
        ////////////////////////////////////////////////////////////////////////

        let mux = Mux {
            sel_n: (
                gpioa
                    .pa3
                    .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper),
                gpioa
                    .pa4
                    .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper),
                gpioa
                    .pa5
                    .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper),
                gpioa
                    .pa6
                    .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper),
            ),
            com_analog: gpioa.pa1.into_analog(&mut gpioa.moder, &mut gpioa.pupdr),
            com_discrete: gpioa
                .pa2
                .into_pull_up_input(&mut gpioa.moder, &mut gpioa.pupdr),
        };

        let board = Self {
            mux,
            spi,
            adc1,
            pitch_cv_pin,
            tim2,
            delay,
            led_state: 0,
            not_ext_gate: gpioa
                .pa8
                .into_floating_input(&mut gpioa.moder, &mut gpioa.pupdr),
            debug_pin: gpiob.pb0.into_push_pull_output_in_state(
                &mut gpiob.moder,
                &mut gpiob.otyper,
                PinState::Low,
            ),
        };

        let calibration_flash = CalibrationFlash {
            keyr: flash.keyr,
            sr: flash.sr,
            cr: flash.cr,
        };

        (board, calibration_flash)
    }

    /// `board.tim2_timeout()` is true iff the voice tick timer has elapsed since the last call
    pub fn tim2_timeout(&mut self) -> bool {
        self.tim2.wait().is_ok()
    }

    /// `board.read_analog_signal(s)` is the current value of analog signal `s` in `[0.0, 1.0]`
    pub fn read_analog_signal(&mut self, signal: AnalogMuxSignal) -> f32 {
        self.mux.read_analog(&mut self.adc1, signal as u8)
    }

    /// `board.pitch_cv_raw()` is the raw 16 bit reading of the pitch CV input
    ///
    /// The input stage is inverting, higher voltages read lower. A failed conversion reads as the rail.
    pub fn pitch_cv_raw(&mut self) -> u16 {
        self.adc1.read(&mut self.pitch_cv_pin).unwrap_or(ADC_MAX)
    }

    /// `board.read_switch_3_way(s)` is the current state of the enumerated 3-way switch `s`
    pub fn read_switch_3_way(&mut self, switch: Switch3way) -> Switch3wayState {
        // each 3-way switch has an upper and lower pin which are read through the discrete MUX
        let (upper_mux_ch, lower_mux_ch) = match switch {
            // pins are based on the physical PCB layout
            Switch3way::Waveform => (1, 0),
            Switch3way::PlayMode => (3, 2),
        };

        switch_3_way_state(
            self.mux.read_discrete(upper_mux_ch),
            self.mux.read_discrete(lower_mux_ch),
        )
    }

    /// `board.tap_pressed()` is the raw, undebounced state of the tap button
    pub fn tap_pressed(&mut self) -> bool {
        // the button pulls the pulled-up line low
        !self.mux.read_discrete(TAP_MUX_CH)
    }

    /// `board.write_voice(v)` writes every control voltage of voice output `v` to the DACs
    pub fn write_voice(&mut self, out: &VoiceOutput) {
        self.dac8162_set_vout(out.pitch_volts, Dac8162Channel::A);
        self.dac128S085_set_vout(out.vca * DAC128S085_MAX_VOUT, Dac128S085Channel::A);
        self.dac128S085_set_vout(out.resonance * DAC128S085_MAX_VOUT, Dac128S085Channel::B);
        self.dac128S085_set_vout(out.vcf * DAC128S085_MAX_VOUT, Dac128S085Channel::C);
        self.dac128S085_set_vout(out.waveform * DAC128S085_MAX_VOUT, Dac128S085Channel::D);
    }

    /// `board.dac8162_set_vout(v, c)` writes the voltage `v` to channel `c` of the onboard DAC.
    ///
    /// # Arguments
    ///
    /// * `v_out` - The analog voltage to write, clamped to `[0.0, DAC8162_MAX_VOLTS]`
    ///
    /// * `channel` - The enumerated DAC channel to write to
    pub fn dac8162_set_vout(&mut self, v_out: f32, channel: Dac8162Channel) {
        let v_out = v_out.max(0.0_f32).min(DAC8162_MAX_VOUT);

        let val_u14 = (v_out * DAC8162_COUNTS_PER_VOLT) as u16;
        // move the value out of DB0 and DB1
        let val_u14 = val_u14 << 2;
        // split it into bytes
        let low_byte = (val_u14 & 0xFF) as u8;
        let mid_byte = (val_u14 >> 8) as u8;
        let high_byte = channel as u8 | 0b0001_1000; // write to channel and update output

        self.spi
            .write(ChipSelect::Cs0, &[high_byte, mid_byte, low_byte]);
    }

    /// `board.dac128S085_set_vout(v, c)` writes the voltage `v` to channel `c` of the onboard DAC.
    ///
    /// # Arguments
    ///
    /// * `v_out` - The analog voltage to write, clamped to `[0.0, DAC128S085_MAX_VOLTS]`
    ///
    /// * `channel` - The enumerated DAC channel to write to
    #[allow(non_snake_case)]
    pub fn dac128S085_set_vout(&mut self, v_out: f32, channel: Dac128S085Channel) {
        let v_out = v_out.max(0.0_f32).min(DAC128S085_MAX_VOUT);

        let val_u12 = (v_out * DAC128S085_COUNTS_PER_VOLT) as u16;

        // split it into bytes
        let low_byte = (val_u12 & 0xFF) as u8;
        let high_byte = (channel as u8) << 4 | (val_u12 >> 8) as u8;

        self.spi.write(ChipSelect::Cs1, &[high_byte, low_byte]);
    }

    /// `board.set_led(l, s)` sets enumerated LED `l` to boolean state `s`
    ///
    /// The shift register is only written when the LED state actually changes.
    pub fn set_led(&mut self, led: Led, state: bool) {
        let new_state = if state {
            self.led_state | led as u8
        } else {
            self.led_state & !(led as u8)
        };
        if new_state != self.led_state {
            self.led_state = new_state;
            self.spi.write(ChipSelect::Cs2, &[self.led_state])
        }
    }

    /// `board.ext_gate()` is the current state of the external gate input
    pub fn ext_gate(&mut self) -> bool {
        self.not_ext_gate.is_low()
    }

    /// `board.delay_ms(ms)` causes the board to busy-wait for `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// `board.set_debug_pin(s)` writes the value `s` to the debug pin, setting it high or low
    pub fn set_debug_pin(&mut self, state: bool) {
        if state {
            self.debug_pin.set_high()
        } else {
            self.debug_pin.set_low()
        }
    }
}

/// The calibration curve's home in the last page of on-chip flash is represented here
///
/// The page is reserved in `memory.x` so the program image never reaches it.
pub struct CalibrationFlash {
    keyr: KEYR,
    sr: SR,
    cr: CR,
}

impl CalibrationStorage for CalibrationFlash {
    fn load(&mut self) -> Result<CalibrationCurve, StorageError> {
        let mut words = [0_u64; CalibrationRecord::WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = unsafe {
                core::ptr::read_volatile((CALIBRATION_PAGE_ADDR as *const u64).add(i))
            };
        }
        CalibrationRecord::from_words(words).map(|r| r.curve())
    }

    fn save(&mut self, curve: &CalibrationCurve) -> Result<(), StorageError> {
        let words = CalibrationRecord::from_curve(curve).to_words();

        let mut prog = self
            .keyr
            .unlock_flash(&mut self.sr, &mut self.cr)
            .map_err(|_| StorageError::Write)?;
        prog.erase_page(FlashPage(CALIBRATION_PAGE))
            .map_err(|_| StorageError::Write)?;
        prog.write_native(CALIBRATION_PAGE_ADDR, &words)
            .map_err(|_| StorageError::Write)?;

        // read back what landed in flash, the programming lock is released when `prog` drops
        drop(prog);
        match self.load() {
            Ok(stored) if stored == *curve => Ok(()),
            _ => Err(StorageError::Write),
        }
    }
}

/// `switch_3_way_state(u, l)` is the 3-way switch state matching the pin states `u` and `l`
///
/// Each 3-way switch has an upper and lower pin, the state is governed by the combination of pin states
fn switch_3_way_state(upper_pin_state: bool, lower_pin_state: bool) -> Switch3wayState {
    match (upper_pin_state, lower_pin_state) {
        (false, true) => Switch3wayState::Up,
        (true, true) => Switch3wayState::Middle,
        _ => Switch3wayState::Down,
    }
}

////////////////////////////////////////////////////////////////////////////////
//
// Public constants
//
////////////////////////////////////////////////////////////////////////////////

/// The frequency of the main system clock
pub const SYST_CLK_FREQ_MHZ: u32 = 80;

/// The frequency of the voice tick
pub const TIM2_FREQ_HZ: u32 = 5_000;

/// The maximum value that can be produced by the Analog to Digital Converters.
pub const ADC_MAX: u16 = 0xFFF0;

/// The maximum value that can be written to the onboard Digital to Analog Converter.
pub const DAC8162_MAX_COUNT: u16 = (1 << 14) - 1;
pub const DAC128S085_MAX_COUNT: u16 = (1 << 12) - 1;

/// The maximum analog voltage that the DAC can produce after onboard amplification
pub const DAC8162_MAX_VOUT: f32 = 10.0_f32;
pub const DAC128S085_MAX_VOUT: f32 = 2.5_f32;

////////////////////////////////////////////////////////////////////////////////
//
// Private constants
//
////////////////////////////////////////////////////////////////////////////////

/// Sample time of every ADC conversion, short enough for the buffered pots and CV input
const ADC_SAMPLE_TIME: SampleTime = SampleTime::Cycles92_5;

/// ADC clock cycles for one 32x oversampled conversion, (92.5 sampling + 12.5 converting) * 32
const ADC_CONVERSION_CYCLES: u32 = (925 + 125) * 32 / 10;

// a control tick reads one pot and the pitch CV, both conversions must fit inside one voice tick
const _: () = assert!(2 * ADC_CONVERSION_CYCLES < SYST_CLK_FREQ_MHZ * 1_000_000 / TIM2_FREQ_HZ);

/// The SPI clock frequency to use
const SPI_CLK_FREQ_MHZ: u32 = 10;

/// The number of DAC counts for 1 volt output
const DAC8162_COUNTS_PER_VOLT: f32 = DAC8162_MAX_COUNT as f32 / DAC8162_MAX_VOUT;
const DAC128S085_COUNTS_PER_VOLT: f32 = DAC128S085_MAX_COUNT as f32 / DAC128S085_MAX_VOUT;

/// The discrete MUX channel of the tap button
const TAP_MUX_CH: u8 = 4;

/// The last 2K page of the 128K flash holds the calibration record
const CALIBRATION_PAGE: usize = 63;
const CALIBRATION_PAGE_ADDR: usize = 0x0801_F800;

////////////////////////////////////////////////////////////////////////////////
//
// Private helper functions
//
////////////////////////////////////////////////////////////////////////////////

/// `adc_fs_to_normalized_fl(v)` is the integer adc value normalized to [0.0, +1.0]
///
/// If the input value would overflow the output range it is clamped.
fn adc_fs_to_normalized_fl(val: u16) -> f32 {
    let val = val.min(ADC_MAX);
    (val as f32) / (ADC_MAX as f32)
}

////////////////////////////////////////////////////////////////////////////////
//
// Public Enums
//
////////////////////////////////////////////////////////////////////////////////

/// Enumerated 3-way switches are represented here. The physical board has a number of switches for specific functions.
#[derive(Clone, Copy)]
pub enum Switch3way {
    Waveform,
    PlayMode,
}

/// Enumerated multiplexed analog signals are represented here.
#[derive(Clone, Copy)]
pub enum AnalogMuxSignal {
    Decay = 9,
    Cutoff = 8,
    Slide = 11,
    Resonance = 7,
    EnvMod = 6,
    Accent = 12,
}

/// Channels of the onboard DAC8162 are represented here
#[derive(Clone, Copy)]
pub enum Dac8162Channel {
    A = 0b000,
}

/// Channels of the onboard DAC128S085 are represented here
#[derive(Clone, Copy)]
pub enum Dac128S085Channel {
    A = 0b000,
    B = 0b001,
    C = 0b010,
    D = 0b011,
}

/// Enumerated LEDs are represented here.
#[derive(Clone, Copy)]
pub enum Led {
    // values are based on the physical PCB layout, LEDs are driven by a 75HC595 shift register
    Gate = (1 << 1),
    CalStep1 = (1 << 3),
    CalStep2 = (1 << 4),
    CalStep3 = (1 << 5),
}

////////////////////////////////////////////////////////////////////////////////
//
// Private Structs and enums
//
////////////////////////////////////////////////////////////////////////////////

#[allow(clippy::type_complexity)]
struct Mux {
    sel_n: (
        Pin<Output<PushPull>, L8, 'A', 3>,
        Pin<Output<PushPull>, L8, 'A', 4>,
        Pin<Output<PushPull>, L8, 'A', 5>,
        Pin<Output<PushPull>, L8, 'A', 6>,
    ),
    com_analog: Pin<Analog, L8, 'A', 1>,
    com_discrete: Pin<Input<PullUp>, L8, 'A', 2>,
}

impl Mux {
    fn select_channel(&mut self, channel: u8) {
        // write the combo of s0..s3 to select the channel
        let channel = channel.min(15);
        if channel & 1 == 1 {
            self.sel_n.0.set_high();
        } else {
            self.sel_n.0.set_low();
        }
        if (channel >> 1) & 1 == 1 {
            self.sel_n.1.set_high();
        } else {
            self.sel_n.1.set_low();
        }
        if (channel >> 2) & 1 == 1 {
            self.sel_n.2.set_high();
        } else {
            self.sel_n.2.set_low();
        }
        if (channel >> 3) & 1 == 1 {
            self.sel_n.3.set_high();
        } else {
            self.sel_n.3.set_low();
        }
    }

    fn read_discrete(&mut self, channel: u8) -> bool {
        self.select_channel(channel);
        self.com_discrete.is_high()
    }

    fn read_analog(&mut self, adc: &mut ADC, channel: u8) -> f32 {
        self.select_channel(channel);
        adc_fs_to_normalized_fl(adc.read(&mut self.com_analog).unwrap_or(0))
    }
}

#[allow(clippy::type_complexity)]
struct SpiBus {
    bus: Spi<
        SPI1,
        (
            Pin<Alternate<PushPull, 5>, L8, 'B', 3>, // SCK
            Pin<Alternate<PushPull, 5>, L8, 'B', 4>, // SDI (unused)
            Pin<Alternate<PushPull, 5>, L8, 'B', 5>, // SDO
        ),
    >,
    // manual chip select pins
    chip_sel: (
        Pin<Output<PushPull>, H8, 'A', 15>,
        Pin<Output<PushPull>, L8, 'B', 6>,
        Pin<Output<PushPull>, L8, 'B', 7>,
    ),
}

enum ChipSelect {
    Cs0,
    Cs1,
    Cs2,
}

impl SpiBus {
    fn write(&mut self, cs: ChipSelect, words: &[u8]) {
        match cs {
            ChipSelect::Cs0 => self.chip_sel.0.set_low(),
            ChipSelect::Cs1 => self.chip_sel.1.set_low(),
            ChipSelect::Cs2 => self.chip_sel.2.set_low(),
        }
        // a failed transfer leaves the DAC at its last value, the next tick writes it again
        self.bus.write(words).ok();
        match cs {
            ChipSelect::Cs0 => self.chip_sel.0.set_high(),
            ChipSelect::Cs1 => self.chip_sel.1.set_high(),
            ChipSelect::Cs2 => self.chip_sel.2.set_high(),
        }
    }
}
