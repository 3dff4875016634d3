/// Breakpoint slot arm/clear validation.
pub mod breakpoint;


/// Emulator console commands and reply framing.
pub mod emulator;
