#![cfg(unix)]

mod common;

use bregress::app::scenarios::enlarger::{EnlargerState, VolumeEnlarger};
use bregress::{Lab, LabOptions};
use common::FakeConsole;
use std::time::Duration;
use tokio::sync::watch;

const MAX_VOL_BYTES: u64 = 2 * 1024 * 1024;

#[tokio::test]
async fn test_enlarger_cycle() {
    let fake = FakeConsole::new();
    let regress = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(regress.path().join("tmp")).unwrap();

    let lab = Lab::new(
        LabOptions::new("crazy-volumes-test", regress.path())
            .with_var("STORAGE", "Dedup")
            .with_console(fake.options()),
    )
    .unwrap();

    let vol1 = lab.get_volume("TestVolume001");
    let vol2 = lab.get_volume("TestVolume002");
    std::fs::write(&vol1.path, vec![0u8; 1024]).unwrap();
    std::fs::write(&vol2.path, vec![0u8; 2048]).unwrap();

    let mut enlarger = VolumeEnlarger::new(vol1.clone(), vol2.clone(), MAX_VOL_BYTES);
    assert_eq!(enlarger.state(), EnlargerState::WaitingMessage);

    // the fake storage always reports a blocked device
    let pause = enlarger.step(&lab).await.unwrap();
    assert_eq!(pause, Duration::ZERO);
    assert_eq!(enlarger.state(), EnlargerState::WaitingGrowth);
    assert_eq!(enlarger.size(), 2 * MAX_VOL_BYTES);
    assert_eq!(enlarger.watched().name, "TestVolume001");

    let sent = fake.sent();
    assert!(sent.contains(&"status storage=Dedup".to_string()));
    assert!(sent.contains(&format!("update volume=TestVolume001 MaxVolBytes={}", 2 * MAX_VOL_BYTES)));
    assert!(sent.contains(&"update volume=TestVolume001 volstatus=Append".to_string()));
    assert!(sent.contains(&"mount storage=Dedup drive=0 slot=0".to_string()));

    // nothing written yet
    let pause = enlarger.step(&lab).await.unwrap();
    assert_eq!(pause, Duration::from_millis(100));
    assert_eq!(enlarger.state(), EnlargerState::WaitingGrowth);

    std::fs::write(&vol1.path, vec![0u8; 4096]).unwrap();
    let pause = enlarger.step(&lab).await.unwrap();
    assert_eq!(pause, Duration::from_secs(1));
    assert_eq!(enlarger.state(), EnlargerState::WaitingStable);

    std::fs::write(&vol1.path, vec![0u8; 8192]).unwrap();
    let pause = enlarger.step(&lab).await.unwrap();
    assert_eq!(pause, Duration::from_millis(1100));
    assert_eq!(enlarger.state(), EnlargerState::WaitingStable);

    let pause = enlarger.step(&lab).await.unwrap();
    assert_eq!(pause, Duration::from_secs(3));
    assert_eq!(enlarger.state(), EnlargerState::WaitingMessage);

    // second swap enlarges the other volume without growing the cap again
    enlarger.step(&lab).await.unwrap();
    assert_eq!(enlarger.size(), 2 * MAX_VOL_BYTES);
    assert_eq!(enlarger.watched().name, "TestVolume002");
    assert!(fake
        .sent()
        .contains(&format!("update volume=TestVolume002 MaxVolBytes={}", 2 * MAX_VOL_BYTES)));

    let harness_log =
        std::fs::read_to_string(regress.path().join("tmp/crazy-volumes-test.harness.log")).unwrap();
    assert!(harness_log.contains("Device is BLOCKED vol=TestVolume001"));
    assert!(harness_log.contains("Volsize stable vol=TestVolume001 size=8192"));
}

#[tokio::test]
async fn test_enlarger_stops_when_flag_is_raised() {
    let fake = FakeConsole::new();
    let regress = tempfile::TempDir::new().unwrap();
    let lab = Lab::new(LabOptions::new("stop-test", regress.path()).with_console(fake.options()))
        .unwrap();

    let vol1 = lab.get_volume("TestVolume001");
    let vol2 = lab.get_volume("TestVolume002");
    std::fs::create_dir_all(vol1.path.parent().unwrap()).unwrap();
    std::fs::write(&vol1.path, b"x").unwrap();
    std::fs::write(&vol2.path, b"y").unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let enlarger = VolumeEnlarger::new(vol1, vol2, MAX_VOL_BYTES);

    let stopper = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stop_tx.send(true).unwrap();
    };
    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(enlarger.run(&lab, stop_rx), stopper) },
    )
    .await
    .expect("enlarger did not stop");
    result.unwrap();
}
