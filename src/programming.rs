// src/programming.rs - training plans, warmups and goal progression
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::validators::Exercise;

const ROM_PROGRESSION_THRESHOLD: f64 = 0.8;
const REP_GOAL_STEP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Reps,
    /// Seconds of holding.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub kind: GoalKind,
    pub value: u32,
}

impl Goal {
    pub const fn reps(value: u32) -> Self {
        Self { kind: GoalKind::Reps, value }
    }

    pub const fn time(value: u32) -> Self {
        Self { kind: GoalKind::Time, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub exercise: Exercise,
    pub goal: Goal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub name: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub days: Vec<DayPlan>,
}

pub static BEGINNER_3X: Lazy<Plan> = Lazy::new(|| {
    let day = |name: &str| DayPlan {
        name: name.to_string(),
        blocks: vec![
            Block { exercise: Exercise::Squat, goal: Goal::reps(12) },
            Block { exercise: Exercise::Pushup, goal: Goal::reps(10) },
            Block { exercise: Exercise::Plank, goal: Goal::time(45) },
        ],
    };

    Plan {
        id: "beg-3x".to_string(),
        name: "Beginner Full Body (3x/week)".to_string(),
        days: vec![day("Day A"), day("Day B"), day("Day C")],
    }
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warmup {
    pub title: &'static str,
    pub steps: &'static [&'static str],
}

pub fn warmup_for(exercise: Exercise) -> Warmup {
    match exercise {
        Exercise::Squat => Warmup {
            title: "Squat warmup",
            steps: &["10 bodyweight good-mornings", "10 air squats to 90°", "5 slow squats to full depth"],
        },
        Exercise::Pushup => Warmup {
            title: "Pushup warmup",
            steps: &["10 wall pushups", "8 incline pushups", "5 normal pushups (slow)"],
        },
        Exercise::Plank => Warmup {
            title: "Plank warmup",
            steps: &["15s high plank hold", "10 shoulder taps", "20s plank hold (hollow)"],
        },
    }
}

/// Raises a rep goal once the two most recent sessions both averaged a ROM
/// score of at least 0.8. `recent_sessions` is newest first, one slice of
/// per-rep scores per session. Time goals are left alone.
pub fn suggest_next_goal(current: Goal, recent_sessions: &[Vec<f64>]) -> Goal {
    if current.kind != GoalKind::Reps || recent_sessions.len() < 2 {
        return current;
    }

    let all_good = recent_sessions.iter().take(2).all(|scores| {
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        mean >= ROM_PROGRESSION_THRESHOLD
    });

    if all_good {
        Goal { value: current.value + REP_GOAL_STEP, ..current }
    } else {
        current
    }
}
