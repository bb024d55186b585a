/// Runtime Dispatcher - Selector to Executor
///
/// **Resolution order:**
/// 1. Framework run with a registered framework → that framework's executor
/// 2. Framework named but unregistered → plain executor for the language
/// 3. Otherwise the plain executor for `language` (or `sub_language` when
///    the top-level language is the Selenium category)
///
/// Anything left over is `Dispatch::Unsupported`, never an error.
use crate::config::ExecutorConfig;
use crate::executors::{
    CsharpExecutor, CucumberExecutor, Executor, InterpretedExecutor, JavaExecutor,
    PytestExecutor, SimulatedExecutor, UnittestExecutor, SIMULATED_FRAMEWORKS,
};
use quest_common::{ExecutionRequest, Language, SELENIUM_CATEGORY};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of resolving one request
#[derive(Clone)]
pub enum Dispatch {
    Executor {
        executor: Arc<dyn Executor>,
        /// Language the source is normalized for
        language: Language,
        /// Set when a framework executor was selected
        framework: Option<&'static str>,
    },
    Unsupported {
        requested: String,
        framework: Option<String>,
    },
}

/// Registry of plain language executors and framework executors
#[derive(Default)]
pub struct Dispatcher {
    languages: HashMap<Language, Arc<dyn Executor>>,
    /// Keyed by lowercased framework name
    frameworks: HashMap<String, Arc<dyn Executor>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in executor
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let mut dispatcher = Self::new();

        dispatcher.register_language(Arc::new(InterpretedExecutor::python(config)));
        dispatcher.register_language(Arc::new(InterpretedExecutor::javascript(config)));
        dispatcher.register_language(Arc::new(JavaExecutor::new(config)));
        dispatcher.register_language(Arc::new(CsharpExecutor::new(config)));

        dispatcher.register_framework(Arc::new(PytestExecutor::new(config)));
        dispatcher.register_framework(Arc::new(UnittestExecutor::new(config)));
        dispatcher.register_framework(Arc::new(CucumberExecutor::new(config)));
        for (framework, language, suggestion) in SIMULATED_FRAMEWORKS {
            dispatcher.register_framework(Arc::new(SimulatedExecutor::new(framework, language, suggestion)));
        }

        dispatcher
    }

    pub fn register_language(&mut self, executor: Arc<dyn Executor>) {
        self.languages.insert(executor.language(), executor);
    }

    pub fn register_framework(&mut self, executor: Arc<dyn Executor>) {
        self.frameworks.insert(executor.name().to_lowercase(), executor);
    }

    /// Registered framework names, sorted
    pub fn frameworks(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.frameworks.values().map(|e| e.name()).collect();
        names.sort_unstable_by_key(|name| name.to_lowercase());
        names
    }

    pub fn resolve(&self, request: &ExecutionRequest) -> Dispatch {
        let requested = target_language(request);

        if request.is_framework_run {
            if let Some(framework) = request.framework.as_deref() {
                match self.frameworks.get(&framework.trim().to_lowercase()) {
                    Some(executor) => {
                        debug!(framework, executor = executor.name(), "Resolved framework executor");
                        return Dispatch::Executor {
                            executor: Arc::clone(executor),
                            language: executor.language(),
                            framework: Some(executor.name()),
                        };
                    }
                    None => {
                        warn!(framework, language = requested, "Unregistered framework; using plain executor");
                    }
                }
            }
        }

        let executor = Language::from_name(requested)
            .and_then(|language| self.languages.get(&language).map(|e| (language, e)));

        match executor {
            Some((language, executor)) => {
                debug!(%language, executor = executor.name(), "Resolved language executor");
                Dispatch::Executor {
                    executor: Arc::clone(executor),
                    language,
                    framework: None,
                }
            }
            None => Dispatch::Unsupported {
                requested: requested.to_string(),
                framework: request.framework.clone(),
            },
        }
    }
}

/// Language selector that actually picks the toolchain: `sub_language` for
/// the Selenium category and for framework runs that name one, `language`
/// otherwise
pub fn target_language(request: &ExecutionRequest) -> &str {
    let sub_language = request
        .sub_language
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if request.language.trim().eq_ignore_ascii_case(SELENIUM_CATEGORY) || request.is_framework_run {
        if let Some(sub_language) = sub_language {
            return sub_language;
        }
    }
    request.language.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::from_config(&ExecutorConfig::default())
    }

    fn resolved(dispatch: Dispatch) -> (&'static str, Language) {
        match dispatch {
            Dispatch::Executor { executor, language, .. } => (executor.name(), language),
            Dispatch::Unsupported { requested, .. } => panic!("unsupported: {}", requested),
        }
    }

    #[test]
    fn test_plain_languages() {
        let d = dispatcher();
        for language in Language::ALL {
            let request = ExecutionRequest::new(language.to_string(), "");
            assert_eq!(resolved(d.resolve(&request)).1, language);
        }
    }

    #[test]
    fn test_registered_framework_wins() {
        let request = ExecutionRequest::new("selenium", "")
            .with_sub_language("python")
            .with_framework("pytest")
            .framework_run();

        assert_eq!(resolved(dispatcher().resolve(&request)), ("pytest", Language::Python));
    }

    #[test]
    fn test_framework_is_reported() {
        let request = ExecutionRequest::new("selenium", "")
            .with_sub_language("java")
            .with_framework("Cucumber")
            .framework_run();

        match dispatcher().resolve(&request) {
            Dispatch::Executor { framework, .. } => assert_eq!(framework, Some("Cucumber")),
            Dispatch::Unsupported { .. } => panic!("cucumber should be registered"),
        }
    }

    #[test]
    fn test_framework_lookup_ignores_case() {
        let request = ExecutionRequest::new("selenium", "")
            .with_sub_language("java")
            .with_framework("testng")
            .framework_run();

        assert_eq!(resolved(dispatcher().resolve(&request)), ("TestNG", Language::Java));
    }

    #[test]
    fn test_unregistered_framework_falls_back_to_language() {
        let request = ExecutionRequest::new("selenium", "")
            .with_sub_language("javascript")
            .with_framework("Cypress")
            .framework_run();

        assert_eq!(resolved(dispatcher().resolve(&request)), ("javascript", Language::Javascript));
    }

    #[test]
    fn test_framework_ignored_without_framework_run() {
        let request = ExecutionRequest::new("python", "").with_framework("pytest");
        assert_eq!(resolved(dispatcher().resolve(&request)).0, "python");
    }

    #[test]
    fn test_selenium_uses_sub_language() {
        let request = ExecutionRequest::new("Selenium", "").with_sub_language("csharp");
        assert_eq!(target_language(&request), "csharp");
        assert_eq!(resolved(dispatcher().resolve(&request)).1, Language::Csharp);
    }

    #[test]
    fn test_unknown_language_is_unsupported() {
        let request = ExecutionRequest::new("ruby", "puts 1");
        match dispatcher().resolve(&request) {
            Dispatch::Unsupported { requested, framework } => {
                assert_eq!(requested, "ruby");
                assert!(framework.is_none());
            }
            Dispatch::Executor { executor, .. } => panic!("resolved to {}", executor.name()),
        }
    }

    #[test]
    fn test_selenium_without_sub_language_is_unsupported() {
        let request = ExecutionRequest::new("selenium", "");
        assert!(matches!(dispatcher().resolve(&request), Dispatch::Unsupported { .. }));
    }

    #[test]
    fn test_empty_registry() {
        let request = ExecutionRequest::new("python", "print(1)");
        assert!(matches!(Dispatcher::new().resolve(&request), Dispatch::Unsupported { .. }));
    }

    #[test]
    fn test_framework_listing() {
        assert_eq!(
            dispatcher().frameworks(),
            vec!["Cucumber", "Jest", "JUnit", "Mocha", "MSTest", "NUnit", "pytest", "TestNG", "unittest"]
        );
    }
}
