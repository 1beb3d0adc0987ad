#![no_main]
use autoscale_core::{Command, ParseError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: &str| {
    match line.parse::<Command>() {
        Ok(Command::Calibrate { mass_g } | Command::RecordPoint { mass_g, .. }) => {
            assert!(mass_g.is_finite());
        }
        Ok(_) => {}
        Err(ParseError::Empty) => assert!(line.trim().is_empty()),
        Err(_) => {}
    }
});
