// Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

use knowledge_prism::config::Config;
use knowledge_prism::init::init_knowledge_base;
use knowledge_prism::pipeline::PipelineOptions;
use knowledge_prism::providers::{ModelCaller, ModelError};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
}

/// A freshly initialised knowledge base in a temp dir
pub struct Fixture {
    _tmp: TempDir,
    pub base: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let report = init_knowledge_base(&tmp.path().join("kb"), Some("Test KB"), today()).unwrap();
        Self {
            base: report.base_dir,
            _tmp: tmp,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.base.join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    pub fn journal(&self, date: &str, file: &str, body: &str) -> PathBuf {
        self.write(&format!("journal/{date}/{file}"), body)
    }

    pub fn options(&self) -> PipelineOptions {
        PipelineOptions::new(&self.base, Config::named("Test KB"))
    }
}

/// A well-formed atom extraction for `stem` with abbreviation `abbrev`
pub fn atom_output(stem: &str, date: &str, abbrev: &str) -> String {
    format!(
        "# Notes on {stem}

> Source: [{stem}](../../../../journal/{date}/{stem}.md)
> Abbrev: {abbrev}

## Atoms

| ID        | Kind     | Content                         | Locator |
| --------- | -------- | ------------------------------- | ------- |
| {abbrev}-01 | fact     | Something happened on {date}    | Intro   |
| {abbrev}-02 | judgment | It mattered more than expected  | Wrap-up |
"
    )
}

/// Scripted model: pops one response per call and records every prompt
pub struct StubCaller {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl StubCaller {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ModelError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelCaller for StubCaller {
    async fn call(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("stub has no scripted response".to_string())))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

