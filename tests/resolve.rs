use std::fs;
use std::path::PathBuf;

use fpl_cheat::players::{build, parse_bootstrap_json, PlayerDirectory, PlayerRecord, Position};
use fpl_cheat::squad::{
    parse_picks_json, resolve, resolve_freetext, resolve_slot, resolve_structured, Pick,
    PlayerSet, RawSquad, SQUAD_SLOTS,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_directory() -> PlayerDirectory {
    build(&parse_bootstrap_json(&read_fixture("bootstrap.json")).unwrap())
}

fn record(player_id: u32, name: &str, position: Position) -> PlayerRecord {
    PlayerRecord {
        player_id,
        display_name: name.to_string(),
        position,
        club_id: 1,
    }
}

fn slots(labels: &[&str]) -> [Option<String>; SQUAD_SLOTS] {
    let mut out: [Option<String>; SQUAD_SLOTS] = Default::default();
    for (slot, label) in out.iter_mut().zip(labels) {
        *slot = Some(label.to_string());
    }
    out
}

#[test]
fn picks_fixture_parses_and_skips_malformed_pick() {
    let picks = parse_picks_json(&read_fixture("picks.json")).expect("fixture should parse");
    assert_eq!(picks.len(), 15);
    let captain = picks.iter().find(|p| p.is_captain).unwrap();
    assert_eq!(captain.player_id, 50);
    assert_eq!(captain.multiplier, 2);
    assert_eq!(picks.iter().filter(|p| p.is_starter()).count(), 11);
    assert!(parse_picks_json("null").unwrap().is_empty());
}

#[test]
fn structured_resolution_is_a_set_and_idempotent() {
    let dir = fixture_directory();
    let picks = parse_picks_json(&read_fixture("picks.json")).unwrap();
    let first = resolve_structured(&picks, &dir);
    let second = resolve_structured(&picks, &dir);
    assert_eq!(first.len(), 15);
    assert_eq!(first, second);
}

#[test]
fn structured_resolution_keeps_unknown_ids_and_drops_zero() {
    let dir = PlayerDirectory::default();
    let pick = |player_id| Pick {
        player_id,
        slot_index: 1,
        is_captain: false,
        is_vice_captain: false,
        multiplier: 1,
    };
    let set = resolve_structured(&[pick(999), pick(0), pick(999), pick(5)], &dir);
    assert_eq!(set, PlayerSet::from([5, 999]));
}

#[test]
fn captain_marker_resolves_by_name() {
    let dir = PlayerDirectory::from_records([record(50, "Salah", Position::Midfielder)]);
    let set = resolve_freetext(&slots(&["Salah (MID) (C)"]), &dir);
    assert_eq!(set, PlayerSet::from([50]));
}

#[test]
fn extracted_name_prefix_of_directory_name() {
    let dir = PlayerDirectory::from_records([record(16, "Haaland Jr", Position::Forward)]);
    let set = resolve_freetext(&slots(&["Haaland (FWD)"]), &dir);
    assert_eq!(set, PlayerSet::from([16]));
}

#[test]
fn directory_name_prefix_of_extracted_name() {
    let dir = fixture_directory();
    assert_eq!(resolve_slot("Gabriel Magalhaes (DEF)", &dir), Some(2));
    assert_eq!(resolve_slot("Alexander (DEF)", &dir), Some(11));
}

#[test]
fn captaincy_never_changes_the_resolved_player() {
    let dir = fixture_directory();
    for label in ["Salah (MID)", "Salah (MID) (C)", "Salah (MID) (VC)", "  salah  "] {
        assert_eq!(resolve_slot(label, &dir), Some(50), "label {label:?}");
    }
}

#[test]
fn duplicate_exact_names_use_position_then_lowest_id() {
    let dir = fixture_directory();
    assert_eq!(resolve_slot("Wilson (FWD)", &dir), Some(18));
    assert_eq!(resolve_slot("Wilson (MID)", &dir), Some(17));
    assert_eq!(resolve_slot("Wilson", &dir), Some(17));
    assert_eq!(resolve_slot("Wilson (GKP)", &dir), Some(17));
}

#[test]
fn prefix_fallback_is_deterministic() {
    let dir = fixture_directory();
    // saka, salah and saliba all extend "sa"; shortest wins unless the tag disagrees.
    assert_eq!(resolve_slot("Sa (MID)", &dir), Some(4));
    assert_eq!(resolve_slot("Sa (DEF)", &dir), Some(3));
    assert_eq!(resolve_slot("Sa", &dir), Some(4));

    let dir = PlayerDirectory::from_records([
        record(3, "Haaland Senior", Position::Forward),
        record(9, "Haaland Jr", Position::Forward),
        record(5, "Haaland Js", Position::Forward),
    ]);
    for _ in 0..5 {
        assert_eq!(resolve_slot("Haal (FWD)", &dir), Some(9));
    }
}

#[test]
fn unresolvable_slots_are_dropped() {
    let dir = fixture_directory();
    let set = resolve_freetext(
        &slots(&["Salah (MID)", "Nobody Here (FWD)", "", " (DEF)", "Unknown ()", "Raya (GKP)"]),
        &dir,
    );
    assert_eq!(set, PlayerSet::from([1, 50]));
}

#[test]
fn all_empty_slots_resolve_to_empty_set() {
    let dir = fixture_directory();
    let empty: [Option<String>; SQUAD_SLOTS] = Default::default();
    assert!(resolve_freetext(&empty, &dir).is_empty());
    assert!(resolve(&RawSquad::FreeText(empty), &dir).is_empty());
}

#[test]
fn empty_directory_resolves_nothing() {
    let dir = PlayerDirectory::default();
    assert!(resolve_freetext(&slots(&["Salah (MID) (C)", "Raya (GKP)"]), &dir).is_empty());
}

#[test]
fn repeated_player_across_slots_collapses() {
    let dir = fixture_directory();
    let set = resolve_freetext(&slots(&["Salah (MID)", "Salah (MID) (C)", "Saka (MID)"]), &dir);
    assert_eq!(set, PlayerSet::from([4, 50]));
}

#[test]
fn resolve_dispatches_on_encoding() {
    let dir = fixture_directory();
    let structured = RawSquad::Structured(parse_picks_json(&read_fixture("picks.json")).unwrap());
    assert_eq!(resolve(&structured, &dir).len(), 15);

    let free = RawSquad::FreeText(slots(&["Isak (FWD)", "Watkins (FWD) (VC)"]));
    assert_eq!(resolve(&free, &dir), PlayerSet::from([8, 9]));
}
