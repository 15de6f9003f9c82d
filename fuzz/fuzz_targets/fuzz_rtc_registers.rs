//! Fuzz target: RV-8803 register decoding
//!
//! Serves arbitrary register contents to the RTC driver and verifies:
//! - No panics (no arithmetic overflow, no out-of-range indexing)
//! - Any accepted reading lies within the chip's 2000–2099 range
//!
//! cargo fuzz run fuzz_rtc_registers

#![no_main]

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};
use libfuzzer_sys::fuzz_target;
use whenpress::app::ports::RtcPeripheral;
use whenpress::drivers::rtc::Rv8803;

const Y2000: u64 = 946_684_800;
const Y2100: u64 = 4_102_444_800;

struct Regs([u8; 8]);

impl ErrorType for Regs {
    type Error = ErrorKind;
}

impl I2c for Regs {
    fn transaction(&mut self, _addr: u8, ops: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        for op in ops {
            if let Operation::Read(buf) = op {
                let n = buf.len().min(8);
                buf[..n].copy_from_slice(&self.0[..n]);
            }
        }
        Ok(())
    }
}

fuzz_target!(|data: [u8; 8]| {
    let mut rtc = Rv8803::new(Regs(data));
    if let Ok(secs) = rtc.epoch_time() {
        assert!((Y2000..Y2100).contains(&secs));
    }
});
