//! Greetings shown to a signed-in user.

use chrono::{Local, Timelike};
use rand::seq::SliceRandom;

const GREETINGS: &[&str] = &[
    "Time for a break?",
    "What's for lunch today?",
    "Up for a quick game?",
    "You might be getting tired.",
];

/// Produces the welcome message stored alongside the user's name.
pub trait Greeter: Send + Sync {
    fn welcome(&self) -> String;
}

/// Picks one of a fixed set of greetings at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGreeter;

impl Greeter for RandomGreeter {
    fn welcome(&self) -> String {
        GREETINGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(GREETINGS[0])
            .to_string()
    }
}

/// Always returns the same message.
#[derive(Debug, Clone, Default)]
pub struct FixedGreeter(pub String);

impl Greeter for FixedGreeter {
    fn welcome(&self) -> String {
        self.0.clone()
    }
}

/// Time-of-day salutation for a 24-hour clock hour.
pub fn salutation(hour: u32) -> &'static str {
    match hour {
        0..=10 => "Good morning",
        11..=13 => "Good day",
        14..=19 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Salutation for the current local time.
pub fn salutation_now() -> &'static str {
    salutation(Local::now().hour())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_greeter_picks_known_greeting() {
        let greeter = RandomGreeter;
        for _ in 0..20 {
            let message = greeter.welcome();
            assert!(GREETINGS.contains(&message.as_str()));
        }
    }

    #[test]
    fn test_salutation_by_hour() {
        assert_eq!(salutation(7), "Good morning");
        assert_eq!(salutation(12), "Good day");
        assert_eq!(salutation(15), "Good afternoon");
        assert_eq!(salutation(21), "Good evening");
    }
}
