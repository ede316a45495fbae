//! Persona selection
//!
//! A persona is a fixed system prompt, an optional fixed instruction, and a
//! post-processing rule for the reply. The table maps caller-supplied keys to
//! personas and always has a default, so selection is total.

mod postprocess;
pub mod prompts;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{PersonaConfig, PersonaEntry, PersonaSelector};

pub use postprocess::strip_code_fences;

/// Key reserved for the fallback persona
pub const DEFAULT_KEY: &str = "default";

/// What happens to the upstream text before it is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcess {
    /// Return the text untouched
    #[default]
    None,
    /// Remove markdown code fences and surrounding whitespace
    StripCodeFences,
}

impl PostProcess {
    pub fn apply(self, text: String) -> String {
        match self {
            PostProcess::None => text,
            PostProcess::StripCodeFences => strip_code_fences(&text),
        }
    }
}

/// One system-prompt template and how to treat its reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub system_prompt: String,
    /// Replaces the caller's message when present
    pub instruction: Option<String>,
    pub post_process: PostProcess,
}

impl Persona {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            instruction: None,
            post_process: PostProcess::None,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_post_process(mut self, post_process: PostProcess) -> Self {
        self.post_process = post_process;
        self
    }

    /// Build the text sent upstream: the system prompt followed by a labeled request line
    pub fn build_prompt(&self, message: Option<&str>) -> String {
        let request = self
            .instruction
            .as_deref()
            .unwrap_or_else(|| message.unwrap_or_default());
        format!("{}\n\nRequest: {}", self.system_prompt, request)
    }
}

impl From<&PersonaEntry> for Persona {
    fn from(entry: &PersonaEntry) -> Self {
        let post_process = if entry.strip_code_fences {
            PostProcess::StripCodeFences
        } else {
            PostProcess::None
        };
        Self {
            system_prompt: entry.prompt.clone(),
            instruction: entry.instruction.clone(),
            post_process,
        }
    }
}

/// Mapping from request key to persona, with a mandatory default
#[derive(Debug, Clone)]
pub struct PersonaTable {
    selector: PersonaSelector,
    personas: BTreeMap<String, Persona>,
    default: Persona,
}

impl PersonaTable {
    /// Create an empty table that only knows its default persona
    pub fn new(selector: PersonaSelector, default: Persona) -> Self {
        Self {
            selector,
            personas: BTreeMap::new(),
            default,
        }
    }

    /// Add or replace a persona; the key `default` replaces the fallback
    pub fn insert(&mut self, key: impl Into<String>, persona: Persona) {
        let key = key.into();
        if key == DEFAULT_KEY {
            self.default = persona;
        } else {
            self.personas.insert(key, persona);
        }
    }

    /// Built-in table keyed by `context`
    pub fn contexts() -> Self {
        let mut table = Self::new(PersonaSelector::Context, Persona::new(prompts::HOSPITAL_PROMPT));
        table.insert("hospital", Persona::new(prompts::HOSPITAL_PROMPT));
        table.insert("jester", Persona::new(prompts::JESTER_PROMPT));
        table.insert("hint", Persona::new(prompts::HINT_PROMPT));
        table.insert(
            "quiz",
            Persona::new(prompts::QUIZ_PROMPT).with_post_process(PostProcess::StripCodeFences),
        );
        table
    }

    /// Built-in legacy table keyed by `mode`
    pub fn legacy_modes() -> Self {
        let city_os = Persona::new(prompts::CITY_OS_PROMPT);
        let mut table = Self::new(PersonaSelector::Mode, city_os.clone());
        table.insert("tip", city_os.clone());
        table.insert("joke", city_os.clone());
        table.insert(
            "generate",
            city_os.with_instruction(prompts::GENERATE_INSTRUCTION),
        );
        table
    }

    /// Built-in table for the configured selector, with configured entries layered on top
    pub fn from_config(config: &PersonaConfig) -> Self {
        let mut table = match config.selector {
            PersonaSelector::Context => Self::contexts(),
            PersonaSelector::Mode => Self::legacy_modes(),
        };
        for (key, entry) in &config.entries {
            tracing::debug!("Registering configured persona '{key}'");
            table.insert(key.clone(), Persona::from(entry));
        }
        table
    }

    /// Which request field this table is keyed by
    pub fn selector(&self) -> PersonaSelector {
        self.selector
    }

    /// Look up a persona, falling back to the default for unknown or absent keys
    pub fn select(&self, key: Option<&str>) -> &Persona {
        key.and_then(|k| self.personas.get(k))
            .unwrap_or(&self.default)
    }

    pub fn default_persona(&self) -> &Persona {
        &self.default
    }

    /// Named personas in key order (excludes the default)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Persona)> {
        self.personas.iter().map(|(k, p)| (k.as_str(), p))
    }
}
