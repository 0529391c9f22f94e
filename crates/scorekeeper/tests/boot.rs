//! Boot, writeback and fault handling on a System 11 board.

use std::sync::Arc;

use game_state::PollState;
use memory_map::{Catalog, ConfigFault, MessageError};
use pinball_core::{Family, Millis, Observable, Value};
use scorekeeper::{Faults, Scorekeeper, ScorekeeperConfig};
use shadow_memory::ShadowMemory;
use spi_fram::{DEVICE_SIZE, Fram, FramChip};

const CATALOG: &str = r#"
{"GameInfo":{"GameName":"Pinbot","System":"11"},"BallInPlay":{"Type":1,"Address":56,"Ball1":"0xF1","Ball2":"0xF2","Ball3":"0xF3","Ball4":"0xF4","Ball5":"0xF5"},"InPlay":{"ScoreAdr":"0x200","ScoreBytes":4},"DisplayMessage":{"Type":1,"AddressS1":"0x500","AddressS2":"0x510","Length":16,"ChecksumStartAdr":"0x500","ChecksumEndAdr":"0x51F","ChecksumResultAdr":"0x520"},"Adjustments":{"ChecksumStartAdr":"0x600","ChecksumEndAdr":"0x6FF","ChecksumResultAdr":"0x700"}}
"#;

fn boot(chip: FramChip, title: &str) -> (Scorekeeper<FramChip>, Arc<ShadowMemory>) {
    let shadow = Arc::new(ShadowMemory::new(0, 0x800));
    let keeper = Scorekeeper::boot(
        ScorekeeperConfig::new(Family::Sys11, title),
        &Catalog::parse(CATALOG),
        Fram::new(chip, DEVICE_SIZE),
        Arc::clone(&shadow),
        Millis(0),
    )
    .unwrap();
    (keeper, shadow)
}

#[test]
fn reboot_restores_shadow_image() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    assert!(keeper.faults().is_empty());
    for i in 0..0x800 {
        shadow.capture_write(i, (i * 7 % 251) as u8);
    }
    keeper.tick(Millis(0));
    assert!(keeper.faults().is_empty());

    let mut chip = FramChip::new(DEVICE_SIZE);
    chip.load_bytes(keeper.fram().device().as_bytes());
    let (mut rebooted, restored) = boot(chip, "Pinbot");

    assert_eq!(restored.snapshot(), shadow.snapshot());
    // Restoring is not capture activity.
    assert!(rebooted.faults().is_empty());
    assert_eq!(rebooted.log_lines().unwrap().len(), 2);
}

#[test]
fn only_changed_chunks_are_written() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    keeper.tick(Millis(0));
    let before = keeper.writeback().chunks_written();

    shadow.capture_write(0x0F, 1);
    shadow.capture_write(0x10, 2);
    keeper.tick(Millis(100));
    assert_eq!(keeper.writeback().chunks_written() - before, 2);
    assert_eq!(keeper.fram().device().peek(0x0F), 1);
    assert_eq!(keeper.fram().device().peek(0x10), 2);
}

#[test]
fn silent_bus_withholds_writeback() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    for t in (0..5_000).step_by(100) {
        keeper.tick(Millis(t));
    }
    let syncs = keeper.writeback().syncs();
    assert_eq!(syncs, 50);

    for t in (5_000..=6_000).step_by(100) {
        keeper.tick(Millis(t));
        assert!(keeper.faults().contains(Faults::NO_BUS_ACTIVITY));
    }
    assert_eq!(keeper.writeback().syncs(), syncs);
    assert_eq!(keeper.query("faults.no_bus_activity"), Some(Value::Bool(true)));

    shadow.capture_write(0x40, 0x55);
    keeper.tick(Millis(6_100));
    assert!(keeper.faults().is_empty());
    assert_eq!(keeper.writeback().syncs(), syncs + 1);
    assert_eq!(keeper.fram().device().peek(0x40), 0x55);
}

#[test]
fn finished_game_is_stored_and_logged() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    shadow.capture_write(0x200, 0x00);
    shadow.write(0x201, &[0x12, 0x34, 0x50]);

    shadow.capture_write(56, 0xF1);
    assert_eq!(keeper.tick(Millis(0)), Some(PollState::Running));
    assert_eq!(keeper.report(Millis(0)).scores[0], 123_450);
    assert_eq!(keeper.query("engine.ball_in_play"), Some(Value::U8(1)));

    shadow.capture_write(56, 0x00);
    assert_eq!(keeper.tick(Millis(30_000)), Some(PollState::JustEnded));

    let last = keeper.last_game().unwrap();
    assert_eq!(last["Scores"][0], 123_450);
    assert_eq!(last["GameTime"], 30.0);
    assert_eq!(last["GameActive"], false);

    let lines = keeper.log_lines().unwrap();
    assert!(lines.iter().any(|l| l.ends_with("game start, ball 1")));
    assert!(lines.iter().any(|l| l.contains("game over, 30.0 s")));

    assert_eq!(keeper.tick(Millis(30_100)), Some(PollState::Idle));
}

#[test]
fn failed_writeback_retries_next_period() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    shadow.capture_write(0x10, 0xAB);
    // WREN goes through, the WRITE frame fails.
    keeper.fram_mut().device_mut().fail_at(2);

    keeper.tick(Millis(0));
    assert!(keeper.faults().contains(Faults::STORAGE));
    assert_eq!(keeper.fram().device().peek(0x10), 0);

    keeper.tick(Millis(100));
    assert!(!keeper.faults().contains(Faults::STORAGE));
    assert_eq!(keeper.fram().device().peek(0x10), 0xAB);
}

#[test]
fn unknown_title_runs_degraded() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Black Knight");
    assert!(keeper.faults().contains(Faults::CONFIG_DEGRADED));
    assert!(keeper.map().is_default());
    assert!(matches!(
        keeper.config_fault(),
        Some(ConfigFault::TitleMissing(_))
    ));
    assert_eq!(keeper.query("degraded"), Some(Value::Bool(true)));
    assert_eq!(keeper.write_message(&["HELLO"]), Err(MessageError::Unsupported));

    // Polling still works; nothing is interpreted.
    shadow.capture_write(56, 0xF1);
    assert_eq!(keeper.tick(Millis(0)), Some(PollState::Idle));

    let lines = keeper.log_lines().unwrap();
    assert!(lines[0].ends_with("boot GenericSystem (11)"));
    assert!(lines[1].contains("config degraded"));
}

#[test]
fn message_and_profiles_keep_checksums_valid() {
    let (mut keeper, shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");

    keeper.write_message(&["grand champion", "joe"]).unwrap();
    let message = keeper.map().display_message.clone().unwrap();
    assert!(message.checksum.unwrap().verify(&shadow));
    assert_eq!(shadow.read_byte(0x510), b'J');

    let checksum = keeper.map().adjustments.unwrap().checksum;
    shadow.write(0x600, &[5; 0x100]);
    checksum.update(&shadow);
    keeper.save_profile(0, "Home").unwrap();

    shadow.write(0x600, &[9; 0x100]);
    keeper.restore_profile(0).unwrap();
    assert_eq!(shadow.read_byte(0x6FF), 5);
    assert!(checksum.verify(&shadow));
    assert_eq!(
        keeper.profile_names().unwrap()[0].as_deref(),
        Some("Home")
    );
}

#[test]
fn log_position_is_observable() {
    let (mut keeper, _shadow) = boot(FramChip::new(DEVICE_SIZE), "Pinbot");
    let used: usize = keeper.log_lines().unwrap().iter().map(|l| l.len() + 1).sum();
    assert_eq!(keeper.query("log.head"), Some(Value::U16(used as u16)));
    assert_eq!(keeper.query("log.wrapped"), Some(Value::Bool(false)));
    assert!(keeper.query_paths().contains(&"log.head"));
}
