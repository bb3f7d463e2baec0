//! Team/Queue Manager (spec §4.6): team formation, invitations, auto-fill,
//! setup period.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use thiserror::Error;
use tracing::info;

use crate::clock::Tick;
use crate::match_engine::{MatchId, ParticipantId};

#[derive(Debug, Clone)]
pub struct Team {
    pub match_id: MatchId,
    pub number: u32,
    pub leader: ParticipantId,
    pub members: HashSet<ParticipantId>,
    pub invite_only: bool,
    pub auto_fill: bool,
    pub size: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TeamError {
    #[error("participant already belongs to a team")]
    AlreadyOnATeam,
    #[error("no such team")]
    NoSuchTeam,
    #[error("team is at capacity")]
    TeamFull,
    #[error("team is invite-only and no invitation is outstanding")]
    NotInvited,
}

/// Tracks every Team across every match, plus the queue of participants
/// awaiting auto-fill assignment and each match's setup-period deadline.
#[derive(Default)]
pub struct TeamManager {
    teams: HashMap<(MatchId, u32), Team>,
    member_of: HashMap<ParticipantId, (MatchId, u32)>,
    invitations: HashSet<(ParticipantId, MatchId, u32)>,
    queue: HashMap<MatchId, Vec<ParticipantId>>,
    setup_deadline: HashMap<MatchId, Tick>,
    next_team_number: HashMap<MatchId, u32>,
}

impl TeamManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A participant may belong to at most one Team globally.
    pub fn is_on_a_team(&self, participant: &ParticipantId) -> bool {
        self.member_of.contains_key(participant)
    }

    pub fn create_team(
        &mut self,
        match_id: MatchId,
        leader: ParticipantId,
        invite_only: bool,
        auto_fill: bool,
        size: u32,
    ) -> Result<u32, TeamError> {
        if self.is_on_a_team(&leader) {
            return Err(TeamError::AlreadyOnATeam);
        }
        let number = *self.next_team_number.entry(match_id).or_insert(0);
        self.next_team_number.insert(match_id, number + 1);
        let mut members = HashSet::new();
        members.insert(leader.clone());
        self.member_of.insert(leader.clone(), (match_id, number));
        self.teams.insert(
            (match_id, number),
            Team {
                match_id,
                number,
                leader,
                members,
                invite_only,
                auto_fill,
                size,
            },
        );
        Ok(number)
    }

    pub fn invite(&mut self, match_id: MatchId, team: u32, invitee: ParticipantId) -> Result<(), TeamError> {
        if !self.teams.contains_key(&(match_id, team)) {
            return Err(TeamError::NoSuchTeam);
        }
        self.invitations.insert((invitee, match_id, team));
        Ok(())
    }

    /// Joins `participant` to `team`. Invite-only teams require an
    /// outstanding invitation; it's consumed on success.
    pub fn join(&mut self, match_id: MatchId, team: u32, participant: ParticipantId) -> Result<(), TeamError> {
        if self.is_on_a_team(&participant) {
            return Err(TeamError::AlreadyOnATeam);
        }
        let key = (match_id, team);
        let team_ref = self.teams.get(&key).ok_or(TeamError::NoSuchTeam)?;
        if team_ref.members.len() as u32 >= team_ref.size {
            return Err(TeamError::TeamFull);
        }
        if team_ref.invite_only {
            let invite_key = (participant.clone(), match_id, team);
            if !self.invitations.remove(&invite_key) {
                return Err(TeamError::NotInvited);
            }
        }
        self.member_of.insert(participant.clone(), key);
        self.teams.get_mut(&key).unwrap().members.insert(participant);
        Ok(())
    }

    /// Queues `participant` for first-arrived-order auto-fill assignment.
    pub fn enqueue(&mut self, match_id: MatchId, participant: ParticipantId) {
        if self.is_on_a_team(&participant) {
            return;
        }
        self.queue.entry(match_id).or_default().push(participant);
    }

    pub fn start_setup_timer(&mut self, match_id: MatchId, deadline_tick: Tick) {
        self.setup_deadline.insert(match_id, deadline_tick);
    }

    /// When the setup-period timer elapses, fills every auto-fill team below
    /// its size with queued participants in arrival order.
    pub fn auto_fill_if_due(&mut self, match_id: MatchId, now: Tick) {
        let Some(&deadline) = self.setup_deadline.get(&match_id) else {
            return;
        };
        if now < deadline {
            return;
        }
        self.setup_deadline.remove(&match_id);
        let mut queued = self.queue.remove(&match_id).unwrap_or_default();
        let team_keys: Vec<(MatchId, u32)> = self
            .teams
            .keys()
            .filter(|(m, _)| *m == match_id)
            .copied()
            .sorted_by_key(|(_, n)| *n)
            .collect();

        for key in team_keys {
            if queued.is_empty() {
                break;
            }
            let team = self.teams.get_mut(&key).unwrap();
            if !team.auto_fill {
                continue;
            }
            while (team.members.len() as u32) < team.size && !queued.is_empty() {
                let participant = queued.remove(0);
                self.member_of.insert(participant.clone(), key);
                team.members.insert(participant);
            }
        }
        info!(?match_id, remaining_unassigned = queued.len(), "auto-fill complete");
    }

    pub fn team_of(&self, participant: &ParticipantId) -> Option<&Team> {
        self.member_of
            .get(participant)
            .and_then(|key| self.teams.get(key))
    }

    pub fn remove(&mut self, participant: &ParticipantId) {
        if let Some(key) = self.member_of.remove(participant) {
            if let Some(team) = self.teams.get_mut(&key) {
                team.members.remove(participant);
            }
        }
        for queued in self.queue.values_mut() {
            queued.retain(|p| p != participant);
        }
    }

    /// Drops every team/queue entry belonging to `match_id` (called by the
    /// registry on match deregistration).
    pub fn cleanup_match(&mut self, match_id: MatchId) {
        self.teams.retain(|(m, _), team| {
            if *m == match_id {
                for member in &team.members {
                    self.member_of.remove(member);
                }
                false
            } else {
                true
            }
        });
        self.queue.remove(&match_id);
        self.setup_deadline.remove(&match_id);
        self.next_team_number.remove(&match_id);
        self.invitations.retain(|(_, m, _)| *m != match_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pid(n: u8) -> ParticipantId {
        vec![n]
    }

    #[test]
    fn participant_cannot_join_two_teams() {
        let mut mgr = TeamManager::new();
        let m = Uuid::now_v7();
        let t1 = mgr.create_team(m, pid(1), false, false, 4).unwrap();
        let t2 = mgr.create_team(m, pid(2), false, false, 4).unwrap();
        let err = mgr.join(m, t2, pid(1)).unwrap_err();
        assert_eq!(err, TeamError::AlreadyOnATeam);
        assert_eq!(mgr.team_of(&pid(1)).unwrap().number, t1);
    }

    #[test]
    fn invite_only_team_rejects_without_invitation() {
        let mut mgr = TeamManager::new();
        let m = Uuid::now_v7();
        let t = mgr.create_team(m, pid(1), true, false, 4).unwrap();
        let err = mgr.join(m, t, pid(2)).unwrap_err();
        assert_eq!(err, TeamError::NotInvited);
        mgr.invite(m, t, pid(2)).unwrap();
        mgr.join(m, t, pid(2)).unwrap();
    }

    #[test]
    fn auto_fill_assigns_queued_participants_in_arrival_order() {
        let mut mgr = TeamManager::new();
        let m = Uuid::now_v7();
        let t = mgr.create_team(m, pid(1), false, true, 3).unwrap();
        mgr.enqueue(m, pid(2));
        mgr.enqueue(m, pid(3));
        mgr.enqueue(m, pid(4));
        mgr.start_setup_timer(m, 100);
        mgr.auto_fill_if_due(m, 50);
        assert!(!mgr.is_on_a_team(&pid(2)));
        mgr.auto_fill_if_due(m, 100);
        let team = mgr.teams.get(&(m, t)).unwrap();
        assert_eq!(team.members.len(), 3);
        assert!(team.members.contains(&pid(2)));
        assert!(team.members.contains(&pid(3)));
        assert!(!team.members.contains(&pid(4)));
    }

    #[test]
    fn cleanup_match_clears_all_state() {
        let mut mgr = TeamManager::new();
        let m = Uuid::now_v7();
        mgr.create_team(m, pid(1), false, false, 4).unwrap();
        mgr.cleanup_match(m);
        assert!(mgr.team_of(&pid(1)).is_none());
    }
}
