use std::fs;
use std::path::PathBuf;

use fpl_cheat::compare::{build_report, creator_squad_view, squad_view};
use fpl_cheat::fpl_api::{parse_fixtures_json, Fixture};
use fpl_cheat::players::{build, parse_bootstrap_json, PlayerDirectory, Position};
use fpl_cheat::squad::{parse_picks_json, Pick, SQUAD_SLOTS};
use fpl_cheat::store::CreatorTeamRow;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn inputs() -> (PlayerDirectory, Vec<Pick>, Vec<Fixture>) {
    let dir = build(&parse_bootstrap_json(&read_fixture("bootstrap.json")).unwrap());
    let picks = parse_picks_json(&read_fixture("picks.json")).unwrap();
    let fixtures = parse_fixtures_json(&read_fixture("fixtures.json")).unwrap();
    (dir, picks, fixtures)
}

fn creator(team_id: u32, name: &str, gameweek: u32, labels: &[&str]) -> CreatorTeamRow {
    let mut slots: [Option<String>; SQUAD_SLOTS] = Default::default();
    for (slot, label) in slots.iter_mut().zip(labels) {
        *slot = Some(label.to_string());
    }
    CreatorTeamRow {
        team_id,
        manager_name: name.to_string(),
        current_gameweek: gameweek,
        slots,
    }
}

#[test]
fn squad_view_labels_fixtures_from_each_side() {
    let (dir, picks, fixtures) = inputs();
    let squad = squad_view(&picks, &dir, &fixtures);
    assert_eq!(squad.len(), 15);

    let by_id = |id: u32| squad.iter().find(|e| e.player_id == id).unwrap();
    assert_eq!(by_id(1).fixture.as_deref(), Some("LIV (H)"));
    assert_eq!(by_id(50).fixture.as_deref(), Some("ARS (A)"));
    assert_eq!(by_id(16).fixture.as_deref(), Some("6 (H)"));
    assert_eq!(by_id(7).fixture.as_deref(), Some("MCI (A)"));
    assert_eq!(by_id(8).fixture, None);
    assert_eq!(by_id(50).club, "LIV");
}

#[test]
fn squad_view_orders_by_slot_and_splits_bench() {
    let (dir, mut picks, fixtures) = inputs();
    picks.reverse();
    let squad = squad_view(&picks, &dir, &fixtures);

    let slots: Vec<u8> = squad.iter().map(|e| e.slot_index).collect();
    assert_eq!(slots, (1..=15).collect::<Vec<u8>>());
    assert_eq!(squad.iter().filter(|e| e.starter).count(), 11);
    assert!(squad[11..].iter().all(|e| !e.starter));

    let captain = squad.iter().find(|e| e.captain).unwrap();
    assert_eq!(captain.name, "Salah");
    assert_eq!(captain.position, Position::Midfielder);
    assert!(squad.iter().find(|e| e.vice_captain).is_some_and(|e| e.player_id == 16));
}

#[test]
fn unknown_pick_is_shown_as_placeholder() {
    let (dir, _, fixtures) = inputs();
    let pick = Pick {
        player_id: 999,
        slot_index: 1,
        is_captain: false,
        is_vice_captain: false,
        multiplier: 1,
    };
    let squad = squad_view(&[pick], &dir, &fixtures);
    assert_eq!(squad[0].name, "Unknown");
    assert_eq!(squad[0].position, Position::Unknown);
    assert_eq!(squad[0].club, "");
    assert_eq!(squad[0].fixture, None);
}

#[test]
fn report_ranks_creators_of_the_requested_gameweek() {
    let (dir, picks, fixtures) = inputs();
    let creators = vec![
        creator(1, "Close", 7, &["Salah (MID) (C)", "Saka (MID)", "Raya (GKP)", "Isak (FWD)"]),
        creator(2, "Far", 7, &["Wilson (MID)"]),
        creator(3, "Empty", 7, &[]),
    ];

    let report = build_report(10, 7, &picks, &dir, &creators, &fixtures, 2);
    assert_eq!(report.manager_id, 10);
    assert_eq!(report.creators_compared, 3);
    assert_eq!(report.stale_creators, 0);
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[0].team_id, 1);
    assert_eq!(report.matches[0].common_player_count, 4);
    assert_eq!(report.matches[0].similarity_score, 26.7);
    assert_eq!(report.matches[1].team_id, 2);
    assert_eq!(report.matches[1].similarity_score, 0.0);
}

#[test]
fn squads_from_other_gameweeks_are_not_ranked() {
    let (dir, picks, fixtures) = inputs();
    let labels: Vec<String> = picks
        .iter()
        .map(|p| dir.get(p.player_id).unwrap().display_name.clone())
        .collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    let creators = vec![
        creator(999, "Last Week", 4, &labels),
        creator(44, "This Week", 7, &["Salah (MID) (C)", "Saka (MID)"]),
    ];

    let report = build_report(10, 7, &picks, &dir, &creators, &fixtures, 3);
    assert_eq!(report.creators_compared, 1);
    assert_eq!(report.stale_creators, 1);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].team_id, 44);
    assert_eq!(report.matches[0].gameweek, 7);
    assert_eq!(report.matches[0].similarity_score, 13.3);

    let only_old = build_report(10, 7, &picks, &dir, &creators[..1], &fixtures, 3);
    assert!(only_old.matches.is_empty());
    assert_eq!(only_old.creators_compared, 0);
    assert_eq!(only_old.stale_creators, 1);
}

#[test]
fn report_without_creators_has_no_matches() {
    let (dir, picks, fixtures) = inputs();
    let report = build_report(10, 7, &picks, &dir, &[], &fixtures, 3);
    assert!(report.matches.is_empty());
    assert_eq!(report.squad.len(), 15);
    assert_eq!(report.stale_creators, 0);
}

#[test]
fn report_serializes_for_json_output() {
    let (dir, picks, fixtures) = inputs();
    let creators = vec![creator(44, "Lets Talk FPL", 7, &["Salah (MID) (C)"])];
    let report = build_report(10, 7, &picks, &dir, &creators, &fixtures, 3);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["matches"][0]["team_id"], 44);
    assert_eq!(json["matches"][0]["similarity_score"], 6.7);
    assert_eq!(json["squad"].as_array().map(|a| a.len()), Some(15));
}

#[test]
fn creator_squad_resolves_stored_labels() {
    let (dir, _, fixtures) = inputs();
    let mut labels = vec!["Raya (GKP)"; 15];
    labels[6] = "Salah (MID) (C)";
    labels[9] = "Haaland (FWD) (VC)";
    labels[11] = "Wilson (FWD)";
    labels[12] = "Unknown ()";
    labels[13] = "";
    let row = creator(44, "Lets Talk FPL", 7, &labels);

    let squad = creator_squad_view(&row, &dir, &fixtures);
    assert_eq!(squad.len(), 14);
    assert_eq!(squad.iter().filter(|e| e.starter).count(), 11);

    let salah = &squad[6];
    assert_eq!((salah.slot_index, salah.player_id), (7, 50));
    assert!(salah.captain && !salah.vice_captain);
    assert_eq!(salah.fixture.as_deref(), Some("ARS (A)"));

    let haaland = &squad[9];
    assert_eq!(haaland.player_id, 16);
    assert!(haaland.vice_captain && !haaland.captain);

    let wilson = &squad[11];
    assert_eq!(wilson.player_id, 18);
    assert!(!wilson.starter);

    let unknown = &squad[12];
    assert_eq!(unknown.player_id, 0);
    assert_eq!(unknown.name, "Unknown");
    assert_eq!(unknown.position, Position::Unknown);

    assert_eq!(squad[13].slot_index, 15);
    assert_eq!(squad.iter().filter(|e| e.captain).count(), 1);
}
