//! Alarm scheduler state machine.
//!
//! The scheduler owns the in-memory alarm list and one slot per alarm. It has
//! no thread and no timer of its own: every operation takes `now`, and real
//! timers live behind a [`TimerDriver`] that calls [`Scheduler::fire`] back.
//!
//! ## Slot transitions
//!
//! ```text
//! Unarmed(reason) --resolve--> Armed(occurrence)
//! Armed --fire, on time--> deliver --resolve from max(now, at)--> Armed | Unarmed
//! Armed --fire, late--> skip --resolve from max(now, at)--> Armed | Unarmed
//! Armed --fire, early--> Armed (same occurrence, re-armed)
//! ```
//!
//! An occurrence is settled (delivered or skipped) at most once. Resolution
//! always starts from the last settled instant of the alarm, so a timer that
//! fires twice or a clock moved backwards cannot repeat a notification.
//!
//! ## Saving
//!
//! Other processes may write the same store. Every save re-reads the stored
//! list, applies only the edits made here since the last successful save and
//! adopts the result, arming alarms added elsewhere and dropping alarms
//! removed elsewhere. Edits that failed to save stay pending and in memory.

use std::collections::HashMap;
use std::mem;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::driver::{ArmToken, TimerDriver};
use crate::alarm::{Alarm, AlarmId, TimeOfDay};
use crate::error::{CoreError, Result, StoreError};
use crate::events::Event;
use crate::notify::{Notification, NotificationSink};
use crate::prayer::{Coordinates, EventTimeProvider};
use crate::resolver::{OccurrenceResolver, Resolution, UnarmedReason, DEFAULT_SEHRI_OFFSET_MINUTES};
use crate::storage::{AlarmStore, Config};

/// Late occurrences found on resume are still delivered within this window.
pub const DEFAULT_GRACE_WINDOW_SECS: i64 = 300;

/// One armed instance of an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub alarm_id: AlarmId,
    pub at: DateTime<Utc>,
    pub token: ArmToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    Armed(Occurrence),
    Unarmed { reason: UnarmedReason },
}

impl SlotState {
    pub fn occurrence(&self) -> Option<&Occurrence> {
        match self {
            SlotState::Armed(occurrence) => Some(occurrence),
            SlotState::Unarmed { .. } => None,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, SlotState::Armed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPolicy {
    pub grace_window: Duration,
    pub sehri_offset: Duration,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            grace_window: Duration::seconds(DEFAULT_GRACE_WINDOW_SECS),
            sehri_offset: Duration::minutes(DEFAULT_SEHRI_OFFSET_MINUTES),
        }
    }
}

impl From<&Config> for SchedulerPolicy {
    fn from(config: &Config) -> Self {
        Self {
            grace_window: config.grace_window(),
            sehri_offset: config.sehri_offset(),
        }
    }
}

pub struct Scheduler {
    store: AlarmStore,
    alarms: Vec<Alarm>,
    slots: HashMap<AlarmId, SlotState>,
    /// Last delivered or skipped instant per alarm.
    settled: HashMap<AlarmId, DateTime<Utc>>,
    coordinates: Coordinates,
    resolver: OccurrenceResolver,
    grace_window: Duration,
    provider: Box<dyn EventTimeProvider>,
    sink: Box<dyn NotificationSink>,
    timers: Box<dyn TimerDriver>,
    last_token: u64,
    /// Edits not yet written to the store.
    pending: HashMap<AlarmId, Pending>,
    events: Vec<Event>,
}

/// An unsaved edit to one alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Upserted,
    Removed,
    /// Only the sehri/iftar display time changed.
    Retimed,
}

impl Scheduler {
    /// Load alarms from `store`. Nothing is armed until [`Scheduler::rebuild`].
    pub fn new(
        store: AlarmStore,
        provider: Box<dyn EventTimeProvider>,
        sink: Box<dyn NotificationSink>,
        timers: Box<dyn TimerDriver>,
        coordinates: Coordinates,
        policy: SchedulerPolicy,
    ) -> Self {
        let alarms = store.load();
        Self {
            store,
            alarms,
            slots: HashMap::new(),
            settled: HashMap::new(),
            coordinates,
            resolver: OccurrenceResolver::with_sehri_offset(policy.sehri_offset),
            grace_window: policy.grace_window,
            provider,
            sink,
            timers,
            last_token: 0,
            pending: HashMap::new(),
            events: Vec::new(),
        }
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Create or replace the alarm with `alarm.id`, re-arm it and persist.
    ///
    /// If saving fails the in-memory change and its timer stay in place and
    /// the store error is returned.
    pub fn upsert_alarm(&mut self, alarm: Alarm, now: DateTime<Local>) -> Result<SlotState> {
        alarm.validate()?;
        self.timers.disarm(&alarm.id);

        let idx = match self.index_of(&alarm.id) {
            Some(idx) => {
                self.alarms[idx] = alarm;
                idx
            }
            None => {
                self.alarms.push(alarm);
                self.alarms.len() - 1
            }
        };

        let id = self.alarms[idx].id.clone();
        let slot = self.arm_slot(idx, now);
        self.pending.insert(id, Pending::Upserted);
        self.persist(now)?;
        Ok(slot)
    }

    pub fn remove_alarm(&mut self, id: &AlarmId, now: DateTime<Local>) -> Result<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))?;

        self.timers.disarm(id);
        self.slots.remove(id);
        self.settled.remove(id);
        self.alarms.remove(idx);
        debug!(alarm_id = %id, "alarm removed");
        self.events.push(Event::AlarmRemoved {
            alarm_id: id.clone(),
            at: now.with_timezone(&Utc),
        });

        self.pending.insert(id.clone(), Pending::Removed);
        self.persist(now)?;
        Ok(())
    }

    pub fn set_active(
        &mut self,
        id: &AlarmId,
        active: bool,
        now: DateTime<Local>,
    ) -> Result<SlotState> {
        let mut alarm = self
            .alarm(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(id.clone()))?;
        alarm.active = active;
        self.upsert_alarm(alarm, now)
    }

    /// Re-resolve every active sehri/iftar alarm for the new location.
    ///
    /// Occurrences already due are settled first, so a fire that is queued
    /// but not yet handled is neither lost nor repeated.
    pub fn on_coordinates_changed(&mut self, coordinates: Coordinates, now: DateTime<Local>) {
        self.settle_due(now);
        self.coordinates = coordinates;
        for idx in 0..self.alarms.len() {
            let alarm = &self.alarms[idx];
            let follows_location = alarm.active && alarm.kind.uses_daily_events();
            if follows_location || !self.slots.contains_key(&alarm.id) {
                let id = alarm.id.clone();
                self.timers.disarm(&id);
                self.arm_slot(idx, now);
            }
        }
        self.flush_cache(now);
    }

    /// Settle occurrences that passed while timers could not run, then
    /// rebuild every slot from the store.
    pub fn on_clock_or_visibility_resume(&mut self, now: DateTime<Local>) {
        self.settle_due(now);

        if !self.pending.is_empty() {
            // Unsaved edits stay authoritative until a save succeeds.
            if let Err(e) = self.persist(now) {
                warn!(error = %e, "alarms still unsaved, keeping in-memory list");
            }
        } else if let Some(stored) = self.store.try_load() {
            self.alarms = stored;
        }
        self.rebuild(now);
    }

    /// Save pending edits and adopt changes other writers made to the store.
    pub fn sync_with_store(&mut self, now: DateTime<Local>) {
        if !self.pending.is_empty() {
            self.flush_cache(now);
        } else if let Some(stored) = self.store.try_load() {
            self.adopt(stored, now);
            self.flush_cache(now);
        }
    }

    /// Timer callback for `id`.
    pub fn fire(&mut self, id: &AlarmId, token: ArmToken, now: DateTime<Local>) {
        let occurrence = match self.slots.get(id) {
            Some(SlotState::Armed(o)) if o.token == token => o.clone(),
            _ => {
                debug!(alarm_id = %id, %token, "stale timer ignored");
                return;
            }
        };

        let now_utc = now.with_timezone(&Utc);
        if occurrence.at > now_utc {
            let delay = to_delay(occurrence.at - now_utc);
            debug!(alarm_id = %id, ?delay, "timer woke early, re-arming");
            self.timers.arm(id, token, delay);
            return;
        }

        self.settle(&occurrence, now);
        if let Some(idx) = self.index_of(id) {
            self.arm_slot(idx, now);
        }
        self.flush_cache(now);
    }

    /// Disarm everything and re-derive every slot.
    pub fn rebuild(&mut self, now: DateTime<Local>) {
        for id in self.slots.keys() {
            self.timers.disarm(id);
        }
        self.slots.clear();
        self.settled.retain(|id, _| self.alarms.iter().any(|a| &a.id == id));

        for idx in 0..self.alarms.len() {
            let id = self.alarms[idx].id.clone();
            self.timers.disarm(&id);
            self.arm_slot(idx, now);
        }
        self.flush_cache(now);
    }

    /// Disarm every timer.
    pub fn shutdown(&mut self) {
        for id in self.slots.keys() {
            self.timers.disarm(id);
        }
        self.slots.clear();
    }

    /// Events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn alarm(&self, id: &AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|a| &a.id == id)
    }

    pub fn slot(&self, id: &AlarmId) -> Option<&SlotState> {
        self.slots.get(id)
    }

    /// Slots in alarm list order.
    pub fn slots(&self) -> Vec<(AlarmId, SlotState)> {
        self.alarms
            .iter()
            .filter_map(|a| self.slots.get(&a.id).map(|s| (a.id.clone(), s.clone())))
            .collect()
    }

    /// The armed occurrence that fires first.
    pub fn next_due(&self) -> Option<&Occurrence> {
        self.slots
            .values()
            .filter_map(SlotState::occurrence)
            .min_by_key(|o| o.at)
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn grace_window(&self) -> Duration {
        self.grace_window
    }

    /// Whether some edit has not reached the store yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.pending
            .values()
            .any(|p| matches!(p, Pending::Upserted | Pending::Removed))
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn index_of(&self, id: &AlarmId) -> Option<usize> {
        self.alarms.iter().position(|a| &a.id == id)
    }

    fn next_token(&mut self) -> ArmToken {
        self.last_token += 1;
        ArmToken(self.last_token)
    }

    /// Resolve and arm the alarm at `idx`. The caller has disarmed it.
    fn arm_slot(&mut self, idx: usize, now: DateTime<Local>) -> SlotState {
        let now_utc = now.with_timezone(&Utc);
        let id = self.alarms[idx].id.clone();
        let from = match self.settled.get(&id) {
            Some(settled) if *settled > now_utc => settled.with_timezone(&Local),
            _ => now,
        };

        let resolution = self.resolver.resolve_next(
            &self.alarms[idx],
            &from,
            self.coordinates,
            self.provider.as_ref(),
        );

        let slot = match resolution {
            Resolution::At(at) => {
                let token = self.next_token();
                let delay = to_delay(at - now_utc);
                self.timers.arm(&id, token, delay);
                debug!(alarm_id = %id, %at, %token, "armed");
                self.refresh_display_time(idx, at);
                self.events.push(Event::AlarmArmed {
                    alarm_id: id.clone(),
                    fires_at: at,
                    at: now_utc,
                });
                SlotState::Armed(Occurrence {
                    alarm_id: id.clone(),
                    at,
                    token,
                })
            }
            Resolution::Unresolved(reason) => {
                debug!(alarm_id = %id, ?reason, "not armed");
                self.events.push(Event::AlarmUnarmed {
                    alarm_id: id.clone(),
                    reason,
                    at: now_utc,
                });
                SlotState::Unarmed { reason }
            }
        };

        self.slots.insert(id, slot.clone());
        slot
    }

    /// Settle every armed occurrence at or before `now`, earliest first.
    fn settle_due(&mut self, now: DateTime<Local>) {
        let now_utc = now.with_timezone(&Utc);
        let mut due: Vec<Occurrence> = self
            .slots
            .values()
            .filter_map(SlotState::occurrence)
            .filter(|o| o.at <= now_utc)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.alarm_id.cmp(&b.alarm_id)));

        for occurrence in due {
            self.timers.disarm(&occurrence.alarm_id);
            self.settle(&occurrence, now);
        }
    }

    /// Deliver `occurrence` if it is within the grace window, otherwise skip
    /// it. Either way it is never considered again.
    fn settle(&mut self, occurrence: &Occurrence, now: DateTime<Local>) {
        let now_utc = now.with_timezone(&Utc);
        let id = &occurrence.alarm_id;
        if self.settled.get(id).is_some_and(|s| *s >= occurrence.at) {
            return;
        }
        self.settled.insert(id.clone(), occurrence.at);
        self.slots.remove(id);

        let late = now_utc - occurrence.at;
        if late > self.grace_window {
            info!(alarm_id = %id, late_secs = late.num_seconds(), "occurrence missed, skipping");
            self.events.push(Event::OccurrenceSkipped {
                alarm_id: id.clone(),
                occurrence: occurrence.at,
                late_secs: late.num_seconds(),
                at: now_utc,
            });
            return;
        }

        let Some(alarm) = self.alarm(id) else {
            return;
        };
        let notification = Notification::for_alarm(alarm, occurrence.at);
        match self.sink.show(&notification) {
            Ok(()) => {
                info!(alarm_id = %id, occurrence = %occurrence.at, "alarm delivered");
                self.events.push(Event::AlarmDelivered {
                    alarm_id: id.clone(),
                    occurrence: occurrence.at,
                    at: now_utc,
                });
            }
            Err(e) => {
                warn!(alarm_id = %id, error = %e, "notification delivery failed");
                self.events.push(Event::DeliveryFailed {
                    alarm_id: id.clone(),
                    occurrence: occurrence.at,
                    message: e.to_string(),
                    at: now_utc,
                });
            }
        }
    }

    fn refresh_display_time(&mut self, idx: usize, at: DateTime<Utc>) {
        let alarm = &mut self.alarms[idx];
        if !alarm.kind.uses_daily_events() {
            return;
        }
        let time = TimeOfDay::from_naive_time(at.with_timezone(&Local).time());
        if alarm.time != time {
            alarm.time = time;
            self.pending.entry(alarm.id.clone()).or_insert(Pending::Retimed);
        }
    }

    /// The stored list with the pending edits applied.
    fn merged(&self) -> Vec<Alarm> {
        let Some(mut stored) = self.store.try_load() else {
            return self.alarms.clone();
        };
        stored.retain(|a| self.pending.get(&a.id) != Some(&Pending::Removed));
        for alarm in &self.alarms {
            let existing = stored.iter().position(|a| a.id == alarm.id);
            match (self.pending.get(&alarm.id), existing) {
                (Some(Pending::Upserted), Some(i)) => stored[i] = alarm.clone(),
                (Some(Pending::Upserted), None) => stored.push(alarm.clone()),
                (Some(Pending::Retimed), Some(i)) if stored[i].kind == alarm.kind => {
                    stored[i].time = alarm.time;
                }
                _ => {}
            }
        }
        stored
    }

    /// Save the pending edits on top of whatever is stored now.
    fn persist(&mut self, now: DateTime<Local>) -> std::result::Result<(), StoreError> {
        let merged = self.merged();
        self.store.save_all(&merged)?;
        self.pending.clear();
        self.adopt(merged, now);
        Ok(())
    }

    /// Replace the in-memory list with `stored`, re-arming alarms whose
    /// schedule differs and dropping alarms that are gone.
    fn adopt(&mut self, stored: Vec<Alarm>, now: DateTime<Local>) {
        let previous = mem::replace(&mut self.alarms, stored);
        let now_utc = now.with_timezone(&Utc);

        for old in &previous {
            if self.index_of(&old.id).is_none() {
                self.timers.disarm(&old.id);
                self.slots.remove(&old.id);
                self.settled.remove(&old.id);
                info!(alarm_id = %old.id, "alarm removed by another writer");
                self.events.push(Event::AlarmRemoved {
                    alarm_id: old.id.clone(),
                    at: now_utc,
                });
            }
        }

        for idx in 0..self.alarms.len() {
            let unchanged = previous
                .iter()
                .any(|old| same_schedule(old, &self.alarms[idx]));
            if !unchanged {
                let id = self.alarms[idx].id.clone();
                debug!(alarm_id = %id, "alarm changed by another writer");
                self.timers.disarm(&id);
                self.arm_slot(idx, now);
            }
        }
    }

    /// Save refreshed display times, and retry edits whose save failed.
    fn flush_cache(&mut self, now: DateTime<Local>) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(e) = self.persist(now) {
            warn!(error = %e, "failed to save alarms");
        }
    }
}

/// Equal apart from the derived sehri/iftar display time.
fn same_schedule(a: &Alarm, b: &Alarm) -> bool {
    if a.kind.uses_daily_events() && a.kind == b.kind {
        a.id == b.id
            && a.label == b.label
            && a.active == b.active
            && a.days == b.days
            && a.ringtone == b.ringtone
    } else {
        a == b
    }
}

fn to_delay(d: Duration) -> std::time::Duration {
    d.to_std().unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmKind, Day};
    use crate::error::DeliveryError;
    use crate::notify::RecordingSink;
    use crate::prayer::FixedTimetable;
    use crate::scheduler::ManualTimers;
    use crate::storage::MemoryKv;
    use chrono::TimeZone;

    // 2025-06-15 is a Sunday.
    fn local(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        local(d, h, m).with_timezone(&Utc)
    }

    struct Harness {
        scheduler: Scheduler,
        sink: RecordingSink,
        timers: ManualTimers,
    }

    fn harness_with(kv: MemoryKv, sink: RecordingSink) -> Harness {
        let timers = ManualTimers::new();
        let scheduler = Scheduler::new(
            AlarmStore::new(kv),
            Box::new(FixedTimetable::local()),
            Box::new(sink.clone()),
            Box::new(timers.clone()),
            Coordinates::MECCA,
            SchedulerPolicy::default(),
        );
        Harness {
            scheduler,
            sink,
            timers,
        }
    }

    fn harness() -> Harness {
        harness_with(
            MemoryKv::with_item(crate::storage::ALARMS_KEY, "[]"),
            RecordingSink::new(),
        )
    }

    fn custom(id: &str, h: u8, m: u8) -> Alarm {
        Alarm::new(AlarmKind::Custom, TimeOfDay::new(h, m).unwrap(), id).with_id(id)
    }

    fn token_of(h: &Harness, id: &str) -> ArmToken {
        h.timers.get(&AlarmId::new(id)).unwrap().0
    }

    #[test]
    fn upsert_arms_with_delay_until_occurrence() {
        let mut h = harness();
        let slot = h
            .scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(15, 12, 0));
        let (_, delay) = h.timers.get(&AlarmId::new("a")).unwrap();
        assert_eq!(delay, std::time::Duration::from_secs(3600));
    }

    #[test]
    fn upsert_twice_keeps_one_timer_and_one_entry() {
        let mut h = harness();
        let now = local(15, 11, 0);
        let first = h.scheduler.upsert_alarm(custom("a", 12, 0), now).unwrap();
        let second = h.scheduler.upsert_alarm(custom("a", 12, 0), now).unwrap();
        assert_eq!(h.scheduler.alarms().len(), 1);
        assert_eq!(h.timers.len(), 1);
        assert_eq!(
            first.occurrence().unwrap().at,
            second.occurrence().unwrap().at
        );
    }

    #[test]
    fn superseded_token_never_delivers() {
        let mut h = harness();
        let now = local(15, 11, 0);
        h.scheduler.upsert_alarm(custom("a", 12, 0), now).unwrap();
        let old = token_of(&h, "a");
        h.scheduler.upsert_alarm(custom("a", 12, 30), now).unwrap();

        h.scheduler.fire(&AlarmId::new("a"), old, local(15, 12, 0));
        assert!(h.sink.shown().is_empty());

        let current = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), current, local(15, 12, 30));
        assert_eq!(h.sink.shown().len(), 1);
    }

    #[test]
    fn fire_delivers_then_arms_next_day() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 0));

        let shown = h.sink.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].at, utc(15, 12, 0));
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));

        // The same token again is stale now.
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 1));
        assert_eq!(h.sink.shown().len(), 1);
    }

    #[test]
    fn early_fire_rearms_same_occurrence() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 11, 50));

        assert!(h.sink.shown().is_empty());
        let (rearmed, delay) = h.timers.get(&AlarmId::new("a")).unwrap();
        assert_eq!(rearmed, token);
        assert_eq!(delay, std::time::Duration::from_secs(600));
    }

    #[test]
    fn late_fire_past_grace_skips() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 10));

        assert!(h.sink.shown().is_empty());
        let events = h.scheduler.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::OccurrenceSkipped { late_secs: 600, .. })));
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));
    }

    #[test]
    fn resume_within_grace_delivers_once() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        h.scheduler.on_clock_or_visibility_resume(local(15, 12, 2));
        h.scheduler.on_clock_or_visibility_resume(local(15, 12, 3));
        assert_eq!(h.sink.shown().len(), 1);
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));
    }

    #[test]
    fn resume_past_grace_skips() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        h.scheduler.on_clock_or_visibility_resume(local(15, 12, 10));
        assert!(h.sink.shown().is_empty());
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));
    }

    #[test]
    fn clock_moved_back_does_not_repeat_delivery() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 0));

        h.scheduler.on_clock_or_visibility_resume(local(15, 11, 30));
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));
    }

    #[test]
    fn delivery_failure_counts_as_delivered() {
        let mut h = harness_with(
            MemoryKv::with_item(crate::storage::ALARMS_KEY, "[]"),
            RecordingSink::failing(DeliveryError::SoundUnavailable("x".into())),
        );
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 0));

        assert_eq!(h.sink.shown().len(), 1);
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 12, 0));
        assert!(h
            .scheduler
            .drain_events()
            .iter()
            .any(|e| matches!(e, Event::DeliveryFailed { .. })));
    }

    #[test]
    fn remove_disarms_and_stale_fire_is_noop() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let token = token_of(&h, "a");
        h.scheduler
            .remove_alarm(&AlarmId::new("a"), local(15, 11, 0))
            .unwrap();
        assert!(h.timers.is_empty());

        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 0));
        assert!(h.sink.shown().is_empty());
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut h = harness();
        let err = h
            .scheduler
            .remove_alarm(&AlarmId::new("nope"), local(15, 11, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn set_active_false_disarms() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        let slot = h
            .scheduler
            .set_active(&AlarmId::new("a"), false, local(15, 11, 0))
            .unwrap();
        assert_eq!(
            slot,
            SlotState::Unarmed {
                reason: UnarmedReason::Inactive
            }
        );
        assert!(h.timers.is_empty());
        assert!(!h.scheduler.alarms()[0].active);
    }

    #[test]
    fn empty_days_is_accepted_but_unarmed() {
        let mut h = harness();
        let slot = h
            .scheduler
            .upsert_alarm(custom("a", 12, 0).with_days([]), local(15, 11, 0))
            .unwrap();
        assert_eq!(
            slot,
            SlotState::Unarmed {
                reason: UnarmedReason::NoEligibleDay
            }
        );
        assert_eq!(h.scheduler.alarms().len(), 1);
    }

    #[test]
    fn invalid_alarm_is_rejected_without_changes() {
        let mut h = harness();
        let mut alarm = custom("a", 12, 0);
        alarm.label = "x".repeat(crate::alarm::MAX_LABEL_LEN + 1);
        let err = h.scheduler.upsert_alarm(alarm, local(15, 11, 0)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(h.scheduler.alarms().is_empty());
    }

    #[test]
    fn save_failure_is_reported_after_applying() {
        let mut h = harness_with(
            MemoryKv::with_item(crate::storage::ALARMS_KEY, "[]").read_only(),
            RecordingSink::new(),
        );
        let err = h
            .scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));
        assert_eq!(h.scheduler.alarms().len(), 1);
        assert!(h.scheduler.slot(&AlarmId::new("a")).unwrap().is_armed());
    }

    #[test]
    fn resume_after_failed_save_keeps_unsaved_alarm() {
        let mut h = harness_with(
            MemoryKv::with_item(crate::storage::ALARMS_KEY, "[]").read_only(),
            RecordingSink::new(),
        );
        assert!(h
            .scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .is_err());
        assert!(h.scheduler.has_unsaved_changes());

        h.scheduler.on_clock_or_visibility_resume(local(15, 11, 30));
        assert_eq!(h.scheduler.alarms().len(), 1);
        let slot = h.scheduler.slot(&AlarmId::new("a")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(15, 12, 0));
        assert!(h.scheduler.has_unsaved_changes());

        let token = token_of(&h, "a");
        h.scheduler.fire(&AlarmId::new("a"), token, local(15, 12, 0));
        assert_eq!(h.sink.shown().len(), 1);
    }

    #[test]
    fn successful_save_clears_unsaved_changes() {
        let mut h = harness();
        h.scheduler
            .upsert_alarm(custom("a", 12, 0), local(15, 11, 0))
            .unwrap();
        assert!(!h.scheduler.has_unsaved_changes());
    }

    #[test]
    fn coordinates_change_settles_occurrence_already_due() {
        let mut h = harness();
        let iftar = Alarm::new(AlarmKind::Iftar, TimeOfDay::new(18, 45).unwrap(), "").with_id("i");
        h.scheduler.upsert_alarm(iftar, local(15, 18, 0)).unwrap();
        let queued = token_of(&h, "i");

        // The timer has fired but its message is still queued.
        h.scheduler
            .on_coordinates_changed(Coordinates::new(24.7, 46.7).unwrap(), local(15, 18, 11));
        assert_eq!(h.sink.shown().len(), 1);
        assert_eq!(h.sink.shown()[0].at, utc(15, 18, 10));
        let slot = h.scheduler.slot(&AlarmId::new("i")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 18, 10));

        h.scheduler.fire(&AlarmId::new("i"), queued, local(15, 18, 11));
        assert_eq!(h.sink.shown().len(), 1);
    }

    #[test]
    fn iftar_display_time_follows_armed_occurrence() {
        let mut h = harness();
        let iftar = Alarm::new(AlarmKind::Iftar, TimeOfDay::new(18, 45).unwrap(), "")
            .with_id("i")
            .with_days([Day::Mon]);
        h.scheduler.upsert_alarm(iftar, local(15, 23, 0)).unwrap();
        let slot = h.scheduler.slot(&AlarmId::new("i")).unwrap();
        assert_eq!(slot.occurrence().unwrap().at, utc(16, 18, 10));
        assert_eq!(h.scheduler.alarms()[0].time.to_string(), "18:10");
    }

    #[test]
    fn coordinates_change_rearms_only_daily_event_alarms() {
        let mut h = harness();
        let now = local(15, 11, 0);
        h.scheduler.upsert_alarm(custom("c", 12, 0), now).unwrap();
        let iftar = Alarm::new(AlarmKind::Iftar, TimeOfDay::new(18, 45).unwrap(), "").with_id("i");
        h.scheduler.upsert_alarm(iftar, now).unwrap();
        let custom_token = token_of(&h, "c");
        let iftar_token = token_of(&h, "i");

        h.scheduler
            .on_coordinates_changed(Coordinates::new(24.7, 46.7).unwrap(), now);
        assert_eq!(token_of(&h, "c"), custom_token);
        assert_ne!(token_of(&h, "i"), iftar_token);
        assert_eq!(h.timers.len(), 2);
    }

    #[test]
    fn next_due_is_earliest_armed() {
        let mut h = harness();
        let now = local(15, 11, 0);
        h.scheduler.upsert_alarm(custom("late", 20, 0), now).unwrap();
        h.scheduler.upsert_alarm(custom("soon", 11, 30), now).unwrap();
        assert_eq!(h.scheduler.next_due().unwrap().alarm_id.as_str(), "soon");
    }

    #[test]
    fn rebuild_from_defaults_arms_both() {
        let mut h = harness_with(MemoryKv::new(), RecordingSink::new());
        h.scheduler.rebuild(local(15, 11, 0));
        let slots = h.scheduler.slots();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|(_, s)| s.is_armed()));
        assert_eq!(slots[0].1.occurrence().unwrap().at, utc(16, 5, 5));
        assert_eq!(slots[1].1.occurrence().unwrap().at, utc(15, 18, 10));
    }
}
