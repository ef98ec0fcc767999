//! NSF playback driven through the player's INIT/PLAY protocol.

use famicore::NsfPlayer;

fn build_nsf(total_songs: u8) -> Vec<u8> {
    let mut raw = vec![0u8; 0x80];
    raw[0..5].copy_from_slice(b"NESM\x1A");
    raw[0x05] = 1;
    raw[0x06] = total_songs;
    raw[0x07] = 1;
    raw[0x08..0x0A].copy_from_slice(&0x8000u16.to_le_bytes()); // load
    raw[0x0A..0x0C].copy_from_slice(&0x8000u16.to_le_bytes()); // init
    raw[0x0C..0x0E].copy_from_slice(&0x8001u16.to_le_bytes()); // play
    raw[0x0E..0x12].copy_from_slice(b"tune");
    raw[0x2E..0x34].copy_from_slice(b"nobody");
    raw[0x6E..0x70].copy_from_slice(&16639u16.to_le_bytes());

    // INIT: RTS. PLAY: INC $00, RTS.
    raw.extend_from_slice(&[0x60, 0xE6, 0x00, 0x60]);
    raw
}

fn write_temp_nsf(name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("famicore-{}-{}.nsf", name, std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn init_returns_to_idle_and_play_is_paced() {
    let path = write_temp_nsf("paced", &build_nsf(2));
    let mut player = NsfPlayer::new(&path).unwrap();

    assert_eq!(player.song_index(), 0);
    assert_eq!(player.console.cpu.pc, 0x0001);
    assert_eq!(player.info().song_name, "tune");
    assert_eq!(player.info().artist_name, "nobody");

    // 0.1s at a 16.639ms PLAY period: PLAY ran roughly six times.
    player.step_seconds(0.1);
    let play_calls = player.console.cpu.bus.wram[0];
    assert!(
        (5..=7).contains(&play_calls),
        "PLAY ran {} times",
        play_calls
    );

    let _ = std::fs::remove_file(path);
}

#[test]
fn song_selection_wraps() {
    let path = write_temp_nsf("wrap", &build_nsf(3));
    let mut player = NsfPlayer::new(&path).unwrap();

    assert_eq!(player.song_index(), 0);
    player.next_song();
    assert_eq!(player.song_index(), 1);
    player.next_song();
    player.next_song();
    assert_eq!(player.song_index(), 0);
    player.prev_song();
    assert_eq!(player.song_index(), 2);

    // Song switches re-run INIT with A holding the song index.
    assert_eq!(player.console.cpu.pc, 0x0001);

    let _ = std::fs::remove_file(path);
}

#[test]
fn paused_player_does_not_advance() {
    let path = write_temp_nsf("paused", &build_nsf(1));
    let mut player = NsfPlayer::new(&path).unwrap();

    player.set_play_state(false);
    let before = player.console.cpu.cycle_count();
    player.step_seconds(0.05);
    assert_eq!(player.console.cpu.cycle_count(), before);

    let _ = std::fs::remove_file(path);
}
