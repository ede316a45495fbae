use std::path::Path;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use persona_relay::config::Config;
use persona_relay::persona::{DEFAULT_KEY, PersonaTable, PostProcess};
use serde::Serialize;

use crate::error::CliResult;
use crate::output::{OutputFormat, first_line, truncate_string};

const PROMPT_PREVIEW_CHARS: usize = 60;

#[derive(Parser)]
pub struct PersonasCommand {
    #[clap(long, help = "Show full prompts in table output")]
    pub full: bool,
}

/// One listed persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaRow {
    pub key: String,
    pub post_process: PostProcess,
    pub instruction: Option<String>,
    pub prompt: String,
}

impl PersonasCommand {
    pub async fn execute(&self, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = Config::load(config_path)?;
        let table = PersonaTable::from_config(&config.personas);
        let rows = persona_rows(&table);

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "selector": table.selector(),
                    "personas": rows,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!(
                    "Personas (selected by request field '{}')\n",
                    table.selector().field_name()
                );

                let mut out = Table::new();
                out.load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Key", "Post-process", "Instruction", "Prompt"]);

                for row in &rows {
                    let prompt = if self.full {
                        row.prompt.clone()
                    } else {
                        truncate_string(first_line(&row.prompt), PROMPT_PREVIEW_CHARS)
                    };
                    out.add_row([
                        row.key.as_str(),
                        post_process_label(row.post_process),
                        if row.instruction.is_some() { "fixed" } else { "-" },
                        prompt.as_str(),
                    ]);
                }

                println!("{out}");
            }
        }

        Ok(())
    }
}

/// The fallback persona first, then named personas in key order
pub fn persona_rows(table: &PersonaTable) -> Vec<PersonaRow> {
    std::iter::once((DEFAULT_KEY, table.default_persona()))
        .chain(table.iter())
        .map(|(key, persona)| PersonaRow {
            key: key.to_string(),
            post_process: persona.post_process,
            instruction: persona.instruction.clone(),
            prompt: persona.system_prompt.clone(),
        })
        .collect()
}

fn post_process_label(post_process: PostProcess) -> &'static str {
    match post_process {
        PostProcess::None => "-",
        PostProcess::StripCodeFences => "strip code fences",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use persona_relay::config::PersonaSelector;

    #[test]
    fn test_rows_for_context_table() {
        let rows = persona_rows(&PersonaTable::contexts());
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();

        assert_eq!(keys[0], DEFAULT_KEY);
        assert!(keys.contains(&"quiz"));
        assert!(keys.contains(&"jester"));

        let quiz = rows.iter().find(|r| r.key == "quiz").unwrap();
        assert_eq!(quiz.post_process, PostProcess::StripCodeFences);
    }

    #[test]
    fn test_rows_for_legacy_modes() {
        let rows = persona_rows(&PersonaTable::legacy_modes());
        let generate = rows.iter().find(|r| r.key == "generate").unwrap();
        assert!(generate.instruction.is_some());
    }

    #[test]
    fn test_rows_include_configured_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[personas]
selector = "mode"

[personas.entries.pirate]
prompt = "Talk like a pirate."
strip_code_fences = true
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        let table = PersonaTable::from_config(&config.personas);
        assert_eq!(table.selector(), PersonaSelector::Mode);

        let rows = persona_rows(&table);
        let pirate = rows.iter().find(|r| r.key == "pirate").unwrap();
        assert_eq!(pirate.prompt, "Talk like a pirate.");
        assert_eq!(pirate.post_process, PostProcess::StripCodeFences);
    }

    #[tokio::test]
    async fn test_execute_with_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let result = PersonasCommand { full: false }
            .execute(Some(&missing), OutputFormat::Json)
            .await;
        assert!(result.is_err());
    }
}
