#![no_main]
use libfuzzer_sys::fuzz_target;
use sorter_core::protocol::{Inbound, JogMove, MAX_JOG_STEPS, parse_line};

fuzz_target!(|data: &str| {
    match parse_line(data) {
        Ok(Inbound::Result { bean, .. }) => assert!(bean.get() > 0),
        Ok(Inbound::Command(sorter_core::AdminCommand::Jog(JogMove::Steps(_, n)))) => {
            assert!((1..=MAX_JOG_STEPS).contains(&n));
        }
        _ => {}
    }
});
