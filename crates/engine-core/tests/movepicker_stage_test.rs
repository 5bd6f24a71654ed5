//! MovePicker end-to-end stage behavior on real positions.

use std::collections::HashSet;
use std::sync::Arc;

use engine_core::bitboard::{attacks_from, Bitboard};
use engine_core::position::Position;
use engine_core::search::{EvalHint, History, MovePicker, Phase, SearchFrame};
use engine_core::types::{File, Move, Rank, Square};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn picker(pos: &Position, pv: bool, ttm: Move, depth: i32) -> MovePicker {
    MovePicker::new(
        pos,
        pv,
        ttm,
        &SearchFrame::new(0),
        depth,
        None,
        Arc::new(History::new()),
    )
}

/// Drain a picker, recording the phase each move was emitted from.
fn drain(mut mp: MovePicker) -> Vec<(Move, Phase)> {
    let mut out = Vec::new();
    loop {
        let m = mp.next_move();
        if m.is_none() {
            break;
        }
        out.push((m, mp.current_phase()));
    }
    out
}

/// 手番側の利きの合併（EvalHint 用）
fn attack_union(pos: &Position) -> Bitboard {
    let us = pos.side_to_move();
    let occ = pos.occupied();
    let mut bb = Bitboard::EMPTY;
    for sq in pos.pieces_of_color(us) {
        let pc = pos.piece_on(sq);
        bb |= attacks_from(pc.piece_type(), us, sq, occ);
    }
    bb
}

#[test]
fn startpos_main_search_emits_all_legal_moves_once() {
    let pos = Position::startpos();
    let emitted = drain(picker(&pos, true, Move::NONE, 6));

    // ちょうど合法手の数
    assert_eq!(emitted.len(), 20);

    // 重複なし
    let unique: HashSet<Move> = emitted.iter().map(|(m, _)| *m).collect();
    assert_eq!(unique.len(), 20);

    // すべて合法
    let legal: HashSet<Move> = pos.legal_moves().iter().copied().collect();
    assert_eq!(unique, legal);

    // 初期局面に捕獲はないので全手が NonCaptures から出る
    assert!(emitted.iter().all(|(_, ph)| *ph == Phase::NonCaptures));
}

#[test]
fn tt_move_emitted_first_and_suppressed_later() {
    let pos = Position::startpos();
    let e4 = Move::new(
        Square::make(File::FileE, Rank::Rank2),
        Square::make(File::FileE, Rank::Rank4),
    );
    let emitted = drain(picker(&pos, true, e4, 6));

    // TT手が先頭、かつ一度だけ
    assert_eq!(emitted[0].0, e4);
    assert_eq!(emitted[0].1, Phase::MateKiller); // 単発フェーズは出力時に前進済み
    assert_eq!(emitted.iter().filter(|(m, _)| *m == e4).count(), 1);
    assert_eq!(emitted.len(), 20);
}

#[test]
fn illegal_tt_move_is_not_emitted() {
    let pos = Position::startpos();
    // e2-e5 は生成され得ない手
    let bogus = Move::new(
        Square::make(File::FileE, Rank::Rank2),
        Square::make(File::FileE, Rank::Rank5),
    );
    let emitted = drain(picker(&pos, true, bogus, 6));
    assert_eq!(emitted.len(), 20);
    assert!(emitted.iter().all(|(m, _)| *m != bogus));
}

#[test]
fn in_check_position_yields_exactly_the_evasions() {
    // ルークに王手されたキング: Kd1, Kf1, Kxe2 の3手だけ
    let pos = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
    let mp = picker(&pos, false, Move::NONE, 6);
    assert_eq!(mp.current_phase(), Phase::Evasions);

    let emitted = drain(mp);
    assert_eq!(emitted.len(), 3);
    assert!(emitted.iter().all(|(_, ph)| *ph == Phase::Evasions));

    let legal: HashSet<Move> = pos.legal_moves().iter().copied().collect();
    let unique: HashSet<Move> = emitted.iter().map(|(m, _)| *m).collect();
    assert_eq!(unique, legal);

    // 捕獲による回避（Kxe2）が history 手より先に出る
    let kxe2 = Move::new(Square::E1, Square::make(File::FileE, Rank::Rank2));
    assert_eq!(emitted[0].0, kxe2);
}

#[test]
fn qsearch_no_captures_hint_yields_checks_only() {
    // 白ルーク f2: 黒の駒には一切利いていない
    let pos = Position::from_fen("4k3/8/8/8/8/8/5R2/4K3 w - - 0 1").unwrap();
    let hint = EvalHint { attacked_by_us: attack_union(&pos), specialized_eval: false };
    let mp = MovePicker::new(
        &pos,
        false,
        Move::NONE,
        &SearchFrame::new(0),
        0,
        Some(hint),
        Arc::new(History::new()),
    );
    assert_eq!(mp.current_phase(), Phase::QChecks);

    let emitted = drain(mp);
    // Rf8+ と Re2+ だけが王手
    let rf8 = Move::new(
        Square::make(File::FileF, Rank::Rank2),
        Square::make(File::FileF, Rank::Rank8),
    );
    let re2 = Move::new(
        Square::make(File::FileF, Rank::Rank2),
        Square::make(File::FileE, Rank::Rank2),
    );
    let unique: HashSet<Move> = emitted.iter().map(|(m, _)| *m).collect();
    assert_eq!(unique, HashSet::from([rf8, re2]));

    for (m, ph) in &emitted {
        assert_eq!(*ph, Phase::QChecks);
        assert!(!pos.is_capture(*m));
        assert!(pos.gives_check(*m));
    }
}

#[test]
fn qsearch_without_hint_emits_captures() {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let emitted = drain(picker(&pos, false, Move::NONE, 0));
    assert!(!emitted.is_empty());
    // QCaptures フェーズの手はすべて捕獲
    for (m, ph) in &emitted {
        if *ph == Phase::QCaptures {
            assert!(pos.is_capture(*m) || m.is_promotion());
        }
    }
}

#[test]
fn kiwipete_bad_capture_is_deferred() {
    let pos = Position::from_fen(KIWIPETE).unwrap();
    let emitted = drain(picker(&pos, true, Move::NONE, 6));

    // 合法手48手ぜんぶ
    assert_eq!(emitted.len(), 48);
    let legal: HashSet<Move> = pos.legal_moves().iter().copied().collect();
    let unique: HashSet<Move> = emitted.iter().map(|(m, _)| *m).collect();
    assert_eq!(unique, legal);

    // Qxh3 は h8 ルークに守られた負け捕獲: BadCaptures から出る
    let qxh3 = Move::new(
        Square::make(File::FileF, Rank::Rank3),
        Square::make(File::FileH, Rank::Rank3),
    );
    let (_, qxh3_phase) =
        emitted.iter().find(|(m, _)| *m == qxh3).expect("Qxh3 must be emitted");
    assert_eq!(*qxh3_phase, Phase::BadCaptures);

    // GoodCaptures の手はすべて SEE >= 0 で、BadCaptures より前に出る
    let mut seen_bad = false;
    for (m, ph) in &emitted {
        match ph {
            Phase::GoodCaptures => {
                assert!(!seen_bad, "good capture after a bad capture");
                assert!(pos.see(*m) >= 0, "negative SEE in GoodCaptures: {m}");
            }
            Phase::BadCaptures => {
                seen_bad = true;
                assert!(pos.see(*m) < 0, "non-negative SEE in BadCaptures: {m}");
            }
            Phase::NonCaptures => {
                assert!(!seen_bad, "noncapture after a bad capture");
            }
            _ => {}
        }
    }

    // 最初の GoodCaptures は MVV/LVA 最大の合法捕獲
    let first_good = emitted
        .iter()
        .find(|(_, ph)| *ph == Phase::GoodCaptures)
        .map(|(m, _)| *m)
        .expect("kiwipete has good captures");
    let mvv_lva = |m: Move| {
        if m.is_promotion() {
            2521
        } else {
            pos.mg_value_of_piece_on(m.to()) - pos.type_of_piece_on(m.from())
        }
    };
    let best = pos
        .legal_moves()
        .iter()
        .copied()
        .filter(|m| pos.is_capture(*m) && pos.see(*m) >= 0)
        .map(mvv_lva)
        .max()
        .unwrap();
    assert_eq!(mvv_lva(first_good), best);
}

#[test]
fn killers_rank_above_other_quiets() {
    let pos = Position::startpos();
    let nf3 = Move::new(Square::G1, Square::make(File::FileF, Rank::Rank3));
    let a3 = Move::new(
        Square::make(File::FileA, Rank::Rank2),
        Square::make(File::FileA, Rank::Rank3),
    );
    let mut frame = SearchFrame::new(0);
    frame.killers = [nf3, a3];

    let mp = MovePicker::new(
        &pos,
        true,
        Move::NONE,
        &frame,
        6,
        None,
        Arc::new(History::new()),
    );
    let emitted = drain(mp);
    assert_eq!(emitted[0].0, nf3);
    assert_eq!(emitted[1].0, a3);
}

#[test]
fn mate_killer_phase_emits_after_tt() {
    let pos = Position::startpos();
    let e4 = Move::new(
        Square::make(File::FileE, Rank::Rank2),
        Square::make(File::FileE, Rank::Rank4),
    );
    let d4 = Move::new(
        Square::make(File::FileD, Rank::Rank2),
        Square::make(File::FileD, Rank::Rank4),
    );
    let mut frame = SearchFrame::new(0);
    frame.mate_killer = d4;

    let mp = MovePicker::new(
        &pos,
        true,
        e4,
        &frame,
        6,
        None,
        Arc::new(History::new()),
    );
    let emitted = drain(mp);
    assert_eq!(emitted[0].0, e4);
    assert_eq!(emitted[1].0, d4);
    assert_eq!(emitted.len(), 20);
    // 両方とも一度だけ
    assert_eq!(emitted.iter().filter(|(m, _)| *m == e4 || *m == d4).count(), 2);
}

#[test]
fn history_steers_noncapture_order() {
    let pos = Position::startpos();
    let history = Arc::new(History::new());
    let b3 = Move::new(
        Square::make(File::FileB, Rank::Rank2),
        Square::make(File::FileB, Rank::Rank3),
    );
    // b2-b3 に大きな history を与える
    history.register_success(pos.piece_on(b3.from()), b3, 200);

    let mp = MovePicker::new(
        &pos,
        true,
        Move::NONE,
        &SearchFrame::new(0),
        6,
        None,
        Arc::clone(&history),
    );
    let emitted = drain(mp);
    assert_eq!(emitted[0].0, b3);
}

#[test]
fn evasion_scoring_prefers_tt_then_captures() {
    // 黒クイーン d2 が王手。Kxd2 と Kf1/Ke... を比較
    let pos = Position::from_fen("4k3/8/8/8/8/8/3q4/4K3 w - - 0 1").unwrap();
    let legal: Vec<Move> = pos.legal_moves().iter().copied().collect();
    let capture = legal.iter().copied().find(|m| pos.is_capture(*m));
    if let Some(capture) = capture {
        // TT手に静かな回避を指定しても、その手が最優先
        let quiet = legal.iter().copied().find(|m| !pos.is_capture(*m)).unwrap();
        let emitted = drain(picker(&pos, false, quiet, 6));
        assert_eq!(emitted[0].0, quiet);
        // TT手の次は捕獲回避
        assert_eq!(emitted[1].0, capture);
    }
}

#[test]
fn exhausted_picker_stays_exhausted() {
    let pos = Position::startpos();
    let mut mp = picker(&pos, false, Move::NONE, 6);
    let mut count = 0;
    while mp.next_move().is_some() {
        count += 1;
        assert!(count <= 20, "picker emitted more moves than exist");
    }
    for _ in 0..8 {
        assert!(mp.next_move().is_none());
    }
    assert_eq!(mp.current_phase(), Phase::Stop);
}
