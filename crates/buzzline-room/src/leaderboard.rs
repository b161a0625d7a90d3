//! Ranking participants and teams.
//!
//! Ranks are sequential: every entry gets its 1-based position after a
//! stable sort by score, so equal scores keep join order and still get
//! distinct ranks.

use std::collections::BTreeMap;

use buzzline_protocol::{LeaderboardEntry, LeaderboardView, TeamId, TeamStanding};

use crate::{Participant, Team};

/// All participants, best first.
pub fn rank_players(players: &[Participant]) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&Participant> = players.iter().collect();
    sorted.sort_by(|a, b| b.score.cmp(&a.score));

    sorted
        .into_iter()
        .zip(1u32..)
        .map(|(p, rank)| LeaderboardEntry { player_id: p.id, nickname: p.nickname.clone(), score: p.score, rank })
        .collect()
}

/// Sum of member scores per team id.
pub fn team_scores(players: &[Participant]) -> BTreeMap<TeamId, u32> {
    let mut scores = BTreeMap::new();
    for p in players {
        if let Some(team) = &p.team_id {
            let total = scores.entry(team.clone()).or_insert(0u32);
            *total = total.saturating_add(p.score);
        }
    }
    scores
}

/// Every declared team, best first. Teams without members score 0.
pub fn rank_teams(teams: &[Team], players: &[Participant]) -> Vec<TeamStanding> {
    let scores = team_scores(players);
    let mut standings: Vec<TeamStanding> = teams
        .iter()
        .map(|t| TeamStanding {
            team_id: t.id.clone(),
            name: t.name.clone(),
            score: scores.get(&t.id).copied().unwrap_or(0),
            rank: 0,
        })
        .collect();

    standings.sort_by(|a, b| b.score.cmp(&a.score));
    for (standing, rank) in standings.iter_mut().zip(1u32..) {
        standing.rank = rank;
    }
    standings
}

/// Leaderboard event payload: top `limit` participants, plus team
/// standings in team mode.
pub fn leaderboard(players: &[Participant], teams: &[Team], team_mode: bool, limit: usize) -> LeaderboardView {
    let mut ranked = rank_players(players);
    ranked.truncate(limit);
    LeaderboardView { players: ranked, teams: team_mode.then(|| rank_teams(teams, players)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buzzline_protocol::PlayerId;

    fn player(id: u64, score: u32) -> Participant {
        Participant::new(PlayerId(id), format!("p{id}")).with_score(score)
    }

    fn team(id: &str) -> Team {
        Team { id: id.into(), name: format!("Team {id}"), color: "#000000".into() }
    }

    #[test]
    fn test_ties_get_sequential_ranks_in_prior_order() {
        let players = vec![player(1, 300), player(2, 300), player(3, 200)];
        let ranked = rank_players(&players);

        let ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        // tie policy: sequential ranks, join order kept for equal scores
        assert_eq!(ranked[0].player_id, PlayerId(1));
        assert_eq!(ranked[1].player_id, PlayerId(2));
    }

    #[test]
    fn test_sorts_by_score_descending() {
        let players = vec![player(1, 50), player(2, 400), player(3, 120)];
        let order: Vec<PlayerId> = rank_players(&players).iter().map(|e| e.player_id).collect();
        assert_eq!(order, vec![PlayerId(2), PlayerId(3), PlayerId(1)]);
    }

    #[test]
    fn test_team_scores_sum_members() {
        let players = vec![
            player(1, 100).with_team("A"),
            player(2, 150).with_team("A"),
            player(3, 200).with_team("B"),
        ];
        let scores = team_scores(&players);
        assert_eq!(scores.get("A"), Some(&250));
        assert_eq!(scores.get("B"), Some(&200));
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_rank_teams_includes_empty_teams() {
        let players = vec![player(1, 100).with_team("A"), player(2, 150).with_team("B")];
        let standings = rank_teams(&[team("A"), team("B"), team("C")], &players);
        let order: Vec<(&str, u32, u32)> =
            standings.iter().map(|s| (s.team_id.as_str(), s.score, s.rank)).collect();
        assert_eq!(order, vec![("B", 150, 1), ("A", 100, 2), ("C", 0, 3)]);
    }

    #[test]
    fn test_display_capped_but_sorted_over_everyone() {
        let players: Vec<Participant> = (1..=15).map(|i| player(i, i as u32 * 10)).collect();
        let view = leaderboard(&players, &[], false, 10);
        assert_eq!(view.players.len(), 10);
        assert_eq!(view.players[0].player_id, PlayerId(15));
        assert_eq!(view.players[9].player_id, PlayerId(6));
        assert!(view.teams.is_none());
    }

    #[test]
    fn test_team_mode_adds_standings() {
        let players = vec![player(1, 10).with_team("A")];
        let view = leaderboard(&players, &[team("A")], true, 10);
        assert_eq!(view.teams.unwrap()[0].score, 10);
    }
}
