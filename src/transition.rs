//! Per-element animated transitions scheduled on a [`Scheduler`].
//!
//! Every `(element, transition)` pair gets a schedule that walks the states
//! of [`State`] in order. A transition of a given name preempts older ones of
//! the same name on the same element when it starts: running ones are
//! interrupted, pending ones cancelled, and one caught between start and its
//! first tick makes the newcomer wait a frame.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::dispatch::{Dispatch, Listener};
use crate::ease::{self, Ease};
use crate::error::TransitionError;
use crate::timer::{Scheduler, Timer};

pub const DEFAULT_DURATION_MS: f64 = 250.0;

const EVENT_TYPES: &[&str] = &["start", "end", "interrupt", "cancel"];

pub type ElementId = u64;
pub type TransitionId = u64;

/// Sampled once per frame with eased progress in `[0, 1]`.
pub type TweenFn = Box<dyn FnMut(f64)>;

/// Builds the per-frame tween for one element when its schedule starts.
/// Returning `None` skips that element.
pub type TweenFactory = Rc<dyn Fn(ElementId, usize) -> Option<TweenFn>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    Created,
    Scheduled,
    Starting,
    Started,
    Running,
    Ending,
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub element: ElementId,
    pub index: usize,
    pub id: TransitionId,
    pub name: String,
}

#[derive(Clone)]
struct Tween {
    name: String,
    factory: TweenFactory,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    time: f64,
    delay: f64,
    duration: f64,
    ease: Ease,
}

struct Schedule {
    name: String,
    index: usize,
    state: State,
    timing: Timing,
    tweens: Rc<[Tween]>,
    on: Dispatch<TransitionEvent>,
    running: Vec<TweenFn>,
    timer: Timer,
}

impl Schedule {
    fn event(&self, element: ElementId, id: TransitionId) -> TransitionEvent {
        TransitionEvent {
            element,
            index: self.index,
            id,
            name: self.name.clone(),
        }
    }

    fn end(&mut self, element: ElementId, id: TransitionId, kind: &str) {
        let from = self.state;
        self.state = State::Ended;
        self.timer.stop();
        debug!(element, id, name = %self.name, ?from, kind, "transition ended early");
        emit(&self.on, kind, &self.event(element, id));
    }
}

fn emit(on: &Dispatch<TransitionEvent>, kind: &str, event: &TransitionEvent) {
    if let Err(error) = on.call(kind, event) {
        debug!(%error, "transition event not delivered");
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Schedule,
    Start,
    Tick,
    Stop,
}

struct Registry {
    scheduler: Scheduler,
    next_id: Cell<TransitionId>,
    elements: RefCell<HashMap<ElementId, BTreeMap<TransitionId, Schedule>>>,
}

impl Registry {
    fn with_schedule<R>(&self, element: ElementId, id: TransitionId, f: impl FnOnce(&mut Schedule) -> R) -> Option<R> {
        let mut elements = self.elements.borrow_mut();
        elements.get_mut(&element)?.get_mut(&id).map(f)
    }

    fn callback(self: &Rc<Self>, element: ElementId, id: TransitionId, phase: Phase) -> impl FnMut(f64) + 'static {
        let registry: Weak<Self> = Rc::downgrade(self);
        move |elapsed| {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            match phase {
                Phase::Schedule => registry.schedule(element, id, elapsed),
                Phase::Start => registry.start(element, id, elapsed),
                Phase::Tick => registry.tick(element, id, elapsed),
                Phase::Stop => registry.stop(element, id),
            }
        }
    }

    fn create(
        self: &Rc<Self>,
        element: ElementId,
        id: TransitionId,
        name: &str,
        index: usize,
        timing: Timing,
        tweens: Rc<[Tween]>,
        on: Dispatch<TransitionEvent>,
    ) {
        let exists = self
            .elements
            .borrow()
            .get(&element)
            .is_some_and(|schedules| schedules.contains_key(&id));
        if exists {
            return;
        }

        let timer = self
            .scheduler
            .timer(self.callback(element, id, Phase::Schedule), 0.0, Some(timing.time));
        let schedule = Schedule {
            name: name.to_owned(),
            index,
            state: State::Created,
            timing,
            tweens,
            on,
            running: Vec::new(),
            timer,
        };
        self.elements
            .borrow_mut()
            .entry(element)
            .or_default()
            .insert(id, schedule);
    }

    fn schedule(self: &Rc<Self>, element: ElementId, id: TransitionId, elapsed: f64) {
        let Some((timer, timing)) = self.with_schedule(element, id, |schedule| {
            schedule.state = State::Scheduled;
            (schedule.timer.clone(), schedule.timing)
        }) else {
            return;
        };

        timer.restart(self.callback(element, id, Phase::Start), timing.delay, Some(timing.time));
        if timing.delay <= elapsed {
            self.start(element, id, elapsed - timing.delay);
        }
    }

    fn start(self: &Rc<Self>, element: ElementId, id: TransitionId, elapsed: f64) {
        enum Outcome {
            Gone,
            Stale,
            Deferred,
            Proceed,
        }

        let mut preempted = Vec::new();
        let outcome = {
            let mut elements = self.elements.borrow_mut();
            match elements.get_mut(&element) {
                None => Outcome::Gone,
                Some(schedules) => match schedules.get(&id) {
                    None => Outcome::Gone,
                    Some(own) if own.state != State::Scheduled => Outcome::Stale,
                    Some(own) => {
                        let name = own.name.clone();
                        let mut outcome = Outcome::Proceed;
                        let ids = schedules.keys().copied().collect::<Vec<_>>();
                        for other in ids {
                            let Some(state) = schedules
                                .get(&other)
                                .filter(|schedule| schedule.name == name)
                                .map(|schedule| schedule.state)
                            else {
                                continue;
                            };
                            if state == State::Started {
                                outcome = Outcome::Deferred;
                                break;
                            }
                            let kind = if state == State::Running {
                                "interrupt"
                            } else if other < id {
                                "cancel"
                            } else {
                                continue;
                            };
                            if let Some(schedule) = schedules.remove(&other) {
                                preempted.push((other, kind, schedule));
                            }
                        }
                        outcome
                    }
                },
            }
        };

        for (other, kind, mut schedule) in preempted {
            schedule.end(element, other, kind);
        }

        match outcome {
            Outcome::Gone => return,
            Outcome::Stale => {
                self.stop(element, id);
                return;
            }
            Outcome::Deferred => {
                self.scheduler
                    .timeout(self.callback(element, id, Phase::Start), 0.0, None);
                return;
            }
            Outcome::Proceed => {}
        }

        // The first tick runs at the end of the current frame.
        let registry = Rc::downgrade(self);
        self.scheduler.timeout(
            move |_| {
                if let Some(registry) = registry.upgrade() {
                    registry.run(element, id, elapsed);
                }
            },
            0.0,
            None,
        );

        let Some((on, event)) = self.with_schedule(element, id, |schedule| {
            schedule.state = State::Starting;
            (schedule.on.copy(), schedule.event(element, id))
        }) else {
            return;
        };
        emit(&on, "start", &event);

        let Some((tweens, index)) = self
            .with_schedule(element, id, |schedule| {
                (schedule.state == State::Starting).then(|| {
                    schedule.state = State::Started;
                    (Rc::clone(&schedule.tweens), schedule.index)
                })
            })
            .flatten()
        else {
            return;
        };

        let running = tweens
            .iter()
            .filter_map(|tween| (tween.factory)(element, index))
            .collect::<Vec<_>>();
        self.with_schedule(element, id, |schedule| schedule.running = running);
    }

    fn run(self: &Rc<Self>, element: ElementId, id: TransitionId, elapsed: f64) {
        let Some((timer, timing)) = self
            .with_schedule(element, id, |schedule| {
                (schedule.state == State::Started).then(|| {
                    schedule.state = State::Running;
                    (schedule.timer.clone(), schedule.timing)
                })
            })
            .flatten()
        else {
            return;
        };

        timer.restart(self.callback(element, id, Phase::Tick), timing.delay, Some(timing.time));
        self.tick(element, id, elapsed);
    }

    fn tick(self: &Rc<Self>, element: ElementId, id: TransitionId, elapsed: f64) {
        let Some((t, ending, mut running, timer)) = self.with_schedule(element, id, |schedule| {
            let (t, ending) = if elapsed < schedule.timing.duration {
                ((schedule.timing.ease)(elapsed / schedule.timing.duration), false)
            } else {
                schedule.state = State::Ending;
                (1.0, true)
            };
            (t, ending, std::mem::take(&mut schedule.running), schedule.timer.clone())
        }) else {
            return;
        };

        if ending {
            timer.restart(self.callback(element, id, Phase::Stop), 0.0, None);
        }

        for tween in &mut running {
            tween(t);
        }

        let ended = self
            .with_schedule(element, id, |schedule| {
                schedule.running = running;
                (schedule.state == State::Ending).then(|| (schedule.on.copy(), schedule.event(element, id)))
            })
            .flatten();
        if let Some((on, event)) = ended {
            emit(&on, "end", &event);
            self.stop(element, id);
        }
    }

    fn stop(&self, element: ElementId, id: TransitionId) {
        let removed = {
            let mut elements = self.elements.borrow_mut();
            let Some(schedules) = elements.get_mut(&element) else {
                return;
            };
            let removed = schedules.remove(&id);
            if schedules.is_empty() {
                elements.remove(&element);
            }
            removed
        };

        if let Some(mut schedule) = removed {
            schedule.state = State::Ended;
            schedule.timer.stop();
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for schedules in self.elements.get_mut().values() {
            for schedule in schedules.values() {
                schedule.timer.stop();
            }
        }
    }
}

/// The transition registry of one view.
#[derive(Clone)]
pub struct Transitions {
    registry: Rc<Registry>,
}

impl Transitions {
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            registry: Rc::new(Registry {
                scheduler: scheduler.clone(),
                next_id: Cell::new(1),
                elements: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Schedules a new transition named `name` on every element.
    pub fn begin(&self, name: &str, elements: &[ElementId]) -> Transition {
        let timing = Timing {
            time: self.registry.scheduler.now(),
            delay: 0.0,
            duration: DEFAULT_DURATION_MS,
            ease: ease::cubic_in_out,
        };
        self.begin_with(name, elements.iter().map(|&element| (element, timing)))
    }

    fn begin_with(&self, name: &str, elements: impl Iterator<Item = (ElementId, Timing)>) -> Transition {
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);

        let tweens: Rc<[Tween]> = Rc::from(Vec::new());
        let on = Dispatch::with_types(EVENT_TYPES);
        let mut members = Vec::new();
        for (index, (element, timing)) in elements.enumerate() {
            self.registry
                .create(element, id, name, index, timing, Rc::clone(&tweens), on.copy());
            members.push(element);
        }

        Transition {
            registry: Rc::clone(&self.registry),
            elements: members,
            name: name.to_owned(),
            id,
        }
    }

    /// Ends every transition named `name` on `element` and fires `interrupt`
    /// on each of them, whatever state it had reached.
    pub fn interrupt(&self, element: ElementId, name: &str) {
        let removed = {
            let mut elements = self.registry.elements.borrow_mut();
            let Some(schedules) = elements.get_mut(&element) else {
                return;
            };
            let ids = schedules
                .iter()
                .filter(|(_, schedule)| schedule.name == name)
                .map(|(&id, _)| id)
                .collect::<Vec<_>>();
            let removed = ids
                .into_iter()
                .filter_map(|id| schedules.remove(&id).map(|schedule| (id, schedule)))
                .collect::<Vec<_>>();
            if schedules.is_empty() {
                elements.remove(&element);
            }
            removed
        };

        for (id, mut schedule) in removed {
            schedule.end(element, id, "interrupt");
        }
    }

    pub fn state(&self, element: ElementId, id: TransitionId) -> Option<State> {
        self.registry
            .elements
            .borrow()
            .get(&element)?
            .get(&id)
            .map(|schedule| schedule.state)
    }

    /// The started transition named `name` on `element`, if any.
    pub fn active(&self, element: ElementId, name: &str) -> Option<TransitionId> {
        self.registry
            .elements
            .borrow()
            .get(&element)?
            .iter()
            .find(|(_, schedule)| schedule.state > State::Scheduled && schedule.name == name)
            .map(|(&id, _)| id)
    }

    /// Number of live schedules on `element`.
    pub fn pending(&self, element: ElementId) -> usize {
        self.registry
            .elements
            .borrow()
            .get(&element)
            .map_or(0, BTreeMap::len)
    }
}

impl fmt::Debug for Transitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements = self.registry.elements.borrow();
        f.debug_struct("Transitions")
            .field("elements", &elements.len())
            .field("schedules", &elements.values().map(BTreeMap::len).sum::<usize>())
            .finish()
    }
}

/// Handle for configuring one transition across its elements.
pub struct Transition {
    registry: Rc<Registry>,
    elements: Vec<ElementId>,
    name: String,
    id: TransitionId,
}

impl Transition {
    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    fn each(
        &self,
        latest: State,
        mut f: impl FnMut(&mut Schedule) -> Result<(), TransitionError>,
    ) -> Result<&Self, TransitionError> {
        let mut elements = self.registry.elements.borrow_mut();
        for element in &self.elements {
            let schedule = elements
                .get_mut(element)
                .and_then(|schedules| schedules.get_mut(&self.id))
                .ok_or(TransitionError::NotFound)?;
            if schedule.state > latest {
                return Err(TransitionError::TooLate {
                    state: schedule.state,
                });
            }
            f(schedule)?;
        }
        Ok(self)
    }

    pub fn delay(&self, millis: f64) -> Result<&Self, TransitionError> {
        self.each(State::Created, |schedule| {
            schedule.timing.delay = millis;
            Ok(())
        })
    }

    /// Per-element delay, e.g. to stagger a group by index.
    pub fn delay_with(&self, delay: impl Fn(ElementId, usize) -> f64) -> Result<&Self, TransitionError> {
        // evaluated up front so `delay` may query the registry
        let mut delays = self
            .elements
            .iter()
            .enumerate()
            .map(|(index, &element)| delay(element, index))
            .collect::<Vec<_>>()
            .into_iter();
        self.each(State::Created, |schedule| {
            if let Some(millis) = delays.next() {
                schedule.timing.delay = millis;
            }
            Ok(())
        })
    }

    pub fn duration(&self, millis: f64) -> Result<&Self, TransitionError> {
        self.each(State::Created, |schedule| {
            schedule.timing.duration = millis;
            Ok(())
        })
    }

    pub fn ease(&self, ease: Ease) -> Result<&Self, TransitionError> {
        self.each(State::Started, |schedule| {
            schedule.timing.ease = ease;
            Ok(())
        })
    }

    /// Sets (`Some`) or removes (`None`) the tween called `name`. Schedules
    /// that shared a tween list keep sharing the updated one.
    pub fn tween(&self, name: &str, factory: Option<TweenFactory>) -> Result<&Self, TransitionError> {
        let mut shared: Option<(Rc<[Tween]>, Rc<[Tween]>)> = None;
        self.each(State::Started, |schedule| {
            if let Some((before, after)) = &shared
                && Rc::ptr_eq(before, &schedule.tweens)
            {
                schedule.tweens = Rc::clone(after);
                return Ok(());
            }

            let mut tweens = schedule.tweens.to_vec();
            let existing = tweens.iter().position(|tween| tween.name == name);
            match (existing, &factory) {
                (Some(i), Some(factory)) => tweens[i].factory = Rc::clone(factory),
                (Some(i), None) => {
                    tweens.remove(i);
                }
                (None, Some(factory)) => tweens.push(Tween {
                    name: name.to_owned(),
                    factory: Rc::clone(factory),
                }),
                (None, None) => {}
            }

            let after: Rc<[Tween]> = Rc::from(tweens);
            let before = std::mem::replace(&mut schedule.tweens, Rc::clone(&after));
            shared = Some((before, after));
            Ok(())
        })
    }

    /// Registers a `start`, `end`, `interrupt` or `cancel` listener.
    pub fn on(&self, typenames: &str, listener: Option<Listener<TransitionEvent>>) -> Result<&Self, TransitionError> {
        let mut shared: Option<(Dispatch<TransitionEvent>, Dispatch<TransitionEvent>)> = None;
        self.each(State::Started, |schedule| {
            if let Some((before, after)) = &shared
                && before.shares_all(&schedule.on)
            {
                schedule.on = after.copy();
                return Ok(());
            }

            let mut after = schedule.on.copy();
            after.on(typenames, listener.clone())?;
            let before = std::mem::replace(&mut schedule.on, after.copy());
            shared = Some((before, after));
            Ok(())
        })
    }

    /// Schedules a follow-up transition with the same name that starts when
    /// this one ends on each element.
    pub fn transition(&self) -> Result<Transition, TransitionError> {
        let inherited = {
            let elements = self.registry.elements.borrow();
            self.elements
                .iter()
                .map(|element| -> Result<(ElementId, Timing), TransitionError> {
                    let schedule = elements
                        .get(element)
                        .and_then(|schedules| schedules.get(&self.id))
                        .ok_or(TransitionError::NotFound)?;
                    let timing = schedule.timing;
                    Ok((
                        *element,
                        Timing {
                            time: timing.time + timing.delay + timing.duration,
                            delay: 0.0,
                            ..timing
                        },
                    ))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let transitions = Transitions {
            registry: Rc::clone(&self.registry),
        };
        Ok(transitions.begin_with(&self.name, inherited.into_iter()))
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("elements", &self.elements)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{FrameRequest, ManualClock};

    type Log = Rc<RefCell<Vec<String>>>;

    fn manual() -> (ManualClock, Scheduler, Transitions) {
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(clock.clone());
        let transitions = Transitions::new(&scheduler);
        (clock, scheduler, transitions)
    }

    fn record(transition: &Transition, log: &Log) {
        for kind in EVENT_TYPES {
            let log = log.clone();
            let listener: Listener<TransitionEvent> = Rc::new(move |event: &TransitionEvent| {
                log.borrow_mut().push(format!("{kind}:{}", event.id));
            });
            transition.on(&format!("{kind}.log"), Some(listener)).unwrap();
        }
    }

    fn sampler(log: &Log) -> TweenFactory {
        let log = log.clone();
        Rc::new(move |_: ElementId, _: usize| {
            let log = log.clone();
            Some(Box::new(move |t: f64| log.borrow_mut().push(format!("t={t}"))) as TweenFn)
        })
    }

    #[test]
    fn runs_through_every_state_to_end() {
        let (clock, scheduler, transitions) = manual();
        let log = Log::default();
        let transition = transitions.begin("fill", &[1]);
        transition.duration(100.0).unwrap();
        transition.ease(ease::linear).unwrap();
        transition.tween("fill", Some(sampler(&log))).unwrap();
        record(&transition, &log);
        let id = transition.id();
        assert_eq!(transitions.state(1, id), Some(State::Created));

        scheduler.wake();
        assert_eq!(transitions.state(1, id), Some(State::Running));
        assert_eq!(transitions.active(1, "fill"), Some(id));

        clock.advance(50.0);
        scheduler.wake();
        clock.advance(60.0);
        scheduler.wake();

        assert_eq!(
            *log.borrow(),
            vec![
                format!("start:{id}"),
                "t=0".to_owned(),
                "t=0.5".to_owned(),
                "t=1".to_owned(),
                format!("end:{id}"),
            ]
        );
        assert_eq!(transitions.state(1, id), None);
        assert_eq!(transitions.pending(1), 0);
        clock.advance(16.0);
        assert_eq!(scheduler.wake(), FrameRequest::Idle);
    }

    #[test]
    fn delay_with_staggers_starts_by_index() {
        let (clock, scheduler, transitions) = manual();
        let transition = transitions.begin("fade", &[1, 2, 3]);
        let id = transition.id();
        transition
            .delay_with(|element, index| {
                assert_eq!(transitions.state(element, id), Some(State::Created));
                index as f64 * 100.0
            })
            .unwrap();
        transition.duration(1000.0).unwrap();
        let states = || [1, 2, 3].map(|element| transitions.state(element, id));

        scheduler.wake();
        assert_eq!(
            states(),
            [Some(State::Running), Some(State::Scheduled), Some(State::Scheduled)]
        );

        clock.advance(100.0);
        scheduler.wake();
        assert_eq!(
            states(),
            [Some(State::Running), Some(State::Running), Some(State::Scheduled)]
        );

        clock.advance(100.0);
        scheduler.wake();
        assert_eq!(states(), [Some(State::Running); 3]);
    }

    #[test]
    fn interrupt_before_start_fires_interrupt_only() {
        let (clock, scheduler, transitions) = manual();
        let log = Log::default();
        let transition = transitions.begin("fill", &[1]);
        transition.delay(100.0).unwrap();
        record(&transition, &log);

        scheduler.wake();
        assert_eq!(transitions.state(1, transition.id()), Some(State::Scheduled));
        transitions.interrupt(1, "fill");

        clock.advance(500.0);
        scheduler.wake();
        assert_eq!(*log.borrow(), vec![format!("interrupt:{}", transition.id())]);
    }

    #[test]
    fn newer_transition_interrupts_a_running_one() {
        let (clock, scheduler, transitions) = manual();
        let log = Log::default();
        let first = transitions.begin("fill", &[1]);
        first.duration(1000.0).unwrap();
        record(&first, &log);
        scheduler.wake();

        clock.advance(10.0);
        let second = transitions.begin("fill", &[1]);
        second.duration(20.0).unwrap();
        record(&second, &log);
        clock.advance(10.0);
        scheduler.wake();
        clock.advance(50.0);
        scheduler.wake();

        assert_eq!(
            *log.borrow(),
            vec![
                format!("start:{}", first.id()),
                format!("interrupt:{}", first.id()),
                format!("start:{}", second.id()),
                format!("end:{}", second.id()),
            ]
        );
    }

    #[test]
    fn newer_transition_cancels_an_older_pending_one() {
        let (_, scheduler, transitions) = manual();
        let log = Log::default();
        let first = transitions.begin("fill", &[1]);
        first.delay(500.0).unwrap();
        record(&first, &log);
        let second = transitions.begin("fill", &[1]);
        record(&second, &log);

        scheduler.wake();
        assert_eq!(
            *log.borrow(),
            vec![format!("cancel:{}", first.id()), format!("start:{}", second.id())]
        );
    }

    #[test]
    fn transition_caught_before_its_first_tick_defers_the_newcomer() {
        let (_, scheduler, transitions) = manual();
        let log = Log::default();
        let first = transitions.begin("fill", &[1]);
        first.tween("fill", Some(sampler(&log))).unwrap();
        record(&first, &log);
        let second = transitions.begin("fill", &[1]);
        record(&second, &log);

        scheduler.wake();
        assert_eq!(
            *log.borrow(),
            vec![
                format!("start:{}", first.id()),
                "t=0".to_owned(),
                format!("interrupt:{}", first.id()),
                format!("start:{}", second.id()),
            ]
        );
    }

    #[test]
    fn different_names_run_side_by_side() {
        let (_, scheduler, transitions) = manual();
        let fill = transitions.begin("fill", &[1]);
        let radius = transitions.begin("radius", &[1]);
        scheduler.wake();
        assert_eq!(transitions.state(1, fill.id()), Some(State::Running));
        assert_eq!(transitions.state(1, radius.id()), Some(State::Running));
    }

    #[test]
    fn reconfiguring_too_late_is_an_error() {
        let (clock, scheduler, transitions) = manual();
        let transition = transitions.begin("fill", &[1]);
        scheduler.wake();

        assert_eq!(
            transition.duration(10.0).unwrap_err(),
            TransitionError::TooLate { state: State::Running }
        );
        assert_eq!(
            transition.ease(ease::linear).unwrap_err(),
            TransitionError::TooLate { state: State::Running }
        );

        clock.advance(1000.0);
        scheduler.wake();
        assert_eq!(transition.delay(0.0).unwrap_err(), TransitionError::NotFound);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let (_, _, transitions) = manual();
        let transition = transitions.begin("fill", &[1]);
        let error = transition.on("finish", None).unwrap_err();
        assert!(matches!(error, TransitionError::Dispatch(_)));
    }

    #[test]
    fn sibling_schedules_share_tweens_and_listeners() {
        let (_, _, transitions) = manual();
        let transition = transitions.begin("fill", &[1, 2, 3]);
        let log = Log::default();
        transition.tween("fill", Some(sampler(&log))).unwrap();
        record(&transition, &log);

        let elements = transitions.registry.elements.borrow();
        let schedules = [1u64, 2, 3].map(|element| &elements[&element][&transition.id()]);
        assert!(Rc::ptr_eq(&schedules[0].tweens, &schedules[2].tweens));
        assert_eq!(schedules[1].tweens.len(), 1);
        assert!(schedules[0].on.shares_all(&schedules[1].on));
    }

    #[test]
    fn chained_transition_starts_when_the_first_ends() {
        let (clock, scheduler, transitions) = manual();
        let log = Log::default();
        let first = transitions.begin("fill", &[1]);
        first.duration(100.0).unwrap();
        let second = first.transition().unwrap();
        record(&first, &log);
        record(&second, &log);

        scheduler.wake();
        clock.advance(50.0);
        scheduler.wake();
        assert_eq!(transitions.state(1, second.id()), Some(State::Created));

        clock.advance(60.0);
        scheduler.wake();
        clock.advance(300.0);
        scheduler.wake();
        assert_eq!(
            *log.borrow(),
            vec![
                format!("start:{}", first.id()),
                format!("end:{}", first.id()),
                format!("start:{}", second.id()),
                format!("end:{}", second.id()),
            ]
        );
    }
}
