/*! Hardware collaborator hooks.

Everything the modem needs from the board goes through this trait: the
converters, interrupt control, the optional debug strobe pin, a
monotonic clock for read timeouts and an idle hint for the foreground
spin loops. The modem never touches hardware directly, which is also
what makes it trivial to run against a test double.
*/

/// Monotonic clock ticks; frequency is platform defined.
pub type Ticks = u64;

/// Board services used by the modem.
///
/// The required methods are the ones the modem cannot function
/// without; strobe and interrupt-acknowledge hooks default to no-ops
/// for platforms that don't have them.
pub trait Platform {
    /// Initialize the ADC hardware. Called once from modem setup.
    fn adc_init(&self) {}

    /// Read the current signed, centered audio sample.
    fn adc_read(&self) -> i8;

    /// Acknowledge the ADC interrupt, if the platform needs it.
    fn adc_irq_end(&self) {}

    /// Write one sample to the DAC, full scale centered at 128.
    fn dac_write(&self, sample: u8);

    /// Enable the DAC sample interrupt.
    fn dac_irq_start(&self);

    /// Disable the DAC sample interrupt.
    fn dac_irq_stop(&self);

    /// Acknowledge the DAC interrupt, if the platform needs it.
    fn dac_irq_end(&self) {}

    /// Set up the debug strobe pin.
    fn strobe_init(&self) {}

    /// Raise the debug strobe pin around demodulator work.
    fn strobe_on(&self) {}

    /// Lower the debug strobe pin.
    fn strobe_off(&self) {}

    /// Current monotonic time.
    fn clock(&self) -> Ticks;

    /// Convert milliseconds to clock ticks.
    fn ms_to_ticks(&self, ms: u32) -> Ticks;

    /// Idle hint for foreground busy-wait loops. Must let the sample
    /// contexts make progress; never disables interrupts.
    fn cpu_relax(&self);
}
