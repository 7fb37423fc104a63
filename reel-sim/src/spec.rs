use crate::action::{ActionConverter, KeyActions, TapActions};

/// How a game takes input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Any combination of the listed keys may be held.
    Keys(Vec<String>),
    /// A single tap target at the screen centre.
    Tap,
}

/// Which built-in game renders the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Climber,
    Bouncer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub input: InputKind,
    pub game: GameKind,
}

impl EnvSpec {
    pub fn action_converter(&self) -> Box<dyn ActionConverter> {
        match &self.input {
            InputKind::Keys(keys) => Box::new(KeyActions::new(keys.clone())),
            InputKind::Tap => Box::new(TapActions::new(self.width / 2, self.height / 2)),
        }
    }
}

fn keys(names: &[&str]) -> InputKind {
    InputKind::Keys(names.iter().map(|name| name.to_string()).collect())
}

pub fn registry() -> Vec<EnvSpec> {
    vec![
        EnvSpec {
            name: "Knightower-v0".into(),
            width: 192,
            height: 288,
            input: keys(&["ArrowLeft", "ArrowRight", "ArrowUp"]),
            game: GameKind::Climber,
        },
        EnvSpec {
            name: "Ladders-v0".into(),
            width: 160,
            height: 121,
            input: keys(&["ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown"]),
            game: GameKind::Climber,
        },
        EnvSpec {
            name: "PopUp-v0".into(),
            width: 160,
            height: 240,
            input: InputKind::Tap,
            game: GameKind::Bouncer,
        },
    ]
}

pub fn spec_for_name(name: &str) -> Option<EnvSpec> {
    registry().into_iter().find(|spec| spec.name == name)
}
