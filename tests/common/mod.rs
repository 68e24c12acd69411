#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard};

use scribe::{shared, Exposable, Ref, Referenceable, Shared};

static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// Only one session may be active per process; tests in one binary take turns.
pub fn session_lock() -> MutexGuard<'static, ()> {
    SESSION_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default, Exposable)]
#[scribe(post_load = "rebuild_title")]
pub struct Pawn {
    pub name: String,
    pub age: u32,
    #[scribe(reference)]
    pub friend: Ref<Pawn>,
    #[scribe(skip)]
    pub title: String,
}

impl Pawn {
    fn rebuild_title(&mut self) {
        self.title = format!("{} ({})", self.name, self.age);
    }
}

impl Referenceable for Pawn {
    fn load_id(&self) -> String {
        format!("Pawn_{}", self.name)
    }
}

#[derive(Debug, Default, Exposable)]
pub struct Colony {
    pub name: String,
    #[scribe(list = "deep")]
    pub pawns: Option<Vec<Shared<Pawn>>>,
    #[scribe(reference)]
    pub leader: Ref<Pawn>,
}

pub fn pawn(name: &str, age: u32) -> Shared<Pawn> {
    shared(Pawn {
        name: name.to_owned(),
        age,
        ..Pawn::default()
    })
}

/// The pawns of a loaded colony, or an empty list.
pub fn pawns_of(colony: &Colony) -> Vec<Shared<Pawn>> {
    colony.pawns.clone().unwrap_or_default()
}
