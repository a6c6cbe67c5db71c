use std::fs;

use memefe::logger;

#[test]
fn log_lines_land_in_the_session_file() {
    let path = std::env::temp_dir()
        .join(format!("memefe-log-{}", std::process::id()))
        .join("session.log");
    logger::init_at(&path, false);
    assert_eq!(logger::log_path(), Some(&path));

    memefe::log_warn!("render skipped: {}", "surface is 0x0");
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("MemeFE session started"));
    assert!(contents.contains("[WARN] render skipped: surface is 0x0"));

    let _ = fs::remove_dir_all(path.parent().unwrap());
}
