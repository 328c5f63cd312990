//! Headline → narration → speech driver.
//!
//! One title at a time: filter on length, narrate, speak, pause.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, NarrationError};
use crate::narrator::Narrator;
use crate::speaker::Speaker;

/// Counts for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub fallbacks: usize,
    pub speech_failures: usize,
}

pub struct Pipeline<N, S> {
    narrator: N,
    speaker: S,
    min_title_len: usize,
    delay: Duration,
}

impl<N: Narrator, S: Speaker> Pipeline<N, S> {
    pub fn new(narrator: N, speaker: S, config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            narrator,
            speaker,
            min_title_len: config.min_title_len,
            delay: config.delay()?,
        })
    }

    /// Titles of `min_title_len` bytes or fewer are not worth narrating.
    pub fn qualifies(&self, title: &str) -> bool {
        title.len() > self.min_title_len
    }

    /// Narrate and speak every qualifying title in order.
    ///
    /// Narration errors abort the run. Speech errors are logged and the run
    /// moves on to the next title.
    pub async fn run(&mut self, titles: &[String]) -> Result<RunSummary, NarrationError> {
        let mut summary = RunSummary::default();

        for title in titles {
            if !self.qualifies(title) {
                debug!("Skipping short headline: {title:?}");
                summary.skipped += 1;
                continue;
            }

            // Pause between headlines, not before the first.
            if summary.processed > 0 {
                tokio::time::sleep(self.delay).await;
            }

            info!("Headline: {title}");
            let narration = self.narrator.narrate(title).await?;
            if narration.is_fallback() {
                summary.fallbacks += 1;
            }
            info!("Narration: {}", narration.text());

            if let Err(e) = self.speaker.speak(narration.text()).await {
                warn!("Failed to speak narration: {e}");
                summary.speech_failures += 1;
            }
            summary.processed += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpeechError;
    use crate::headlines::parse_headlines;
    use crate::narrator::{build_prompt, Narration, FALLBACK_NARRATION};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        NarrateStart(String),
        NarrateEnd(String),
        SpeakStart(String),
        SpeakEnd(String),
    }

    type Log = Arc<Mutex<Vec<(Instant, Call)>>>;

    struct FakeNarrator {
        log: Log,
        prompts: Vec<String>,
        fail_on: Option<String>,
        work: Duration,
    }

    impl FakeNarrator {
        fn new(log: Log) -> Self {
            Self {
                log,
                prompts: Vec::new(),
                fail_on: None,
                work: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Narrator for FakeNarrator {
        async fn narrate(&mut self, title: &str) -> Result<Narration, NarrationError> {
            self.log.lock().unwrap().push((Instant::now(), Call::NarrateStart(title.into())));
            self.prompts.push(build_prompt(title));
            if self.fail_on.as_deref() == Some(title) {
                return Err(NarrationError::Status {
                    model: "fake".into(),
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    message: "boom".into(),
                });
            }
            tokio::time::sleep(self.work).await;
            let narration = format!("Narrated: {title}");
            self.log.lock().unwrap().push((Instant::now(), Call::NarrateEnd(narration.clone())));
            Ok(Narration::Text(narration))
        }
    }

    struct FakeSpeaker {
        log: Log,
        fail: bool,
        work: Duration,
    }

    #[async_trait]
    impl Speaker for FakeSpeaker {
        async fn speak(&self, text: &str) -> Result<PathBuf, SpeechError> {
            self.log.lock().unwrap().push((Instant::now(), Call::SpeakStart(text.into())));
            tokio::time::sleep(self.work).await;
            self.log.lock().unwrap().push((Instant::now(), Call::SpeakEnd(text.into())));
            if self.fail {
                return Err(SpeechError::Playback("no device".into()));
            }
            Ok(PathBuf::from("audio/fake.mp3"))
        }
    }

    fn pipeline(log: &Log) -> Pipeline<FakeNarrator, FakeSpeaker> {
        Pipeline::new(
            FakeNarrator::new(log.clone()),
            FakeSpeaker {
                log: log.clone(),
                fail: false,
                work: Duration::ZERO,
            },
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    fn calls(log: &Log) -> Vec<Call> {
        log.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        let log = Log::default();
        let p = pipeline(&log);
        assert!(!p.qualifies(&"x".repeat(25)));
        assert!(p.qualifies(&"x".repeat(26)));
        assert!(!p.qualifies(""));
    }

    #[tokio::test(start_paused = true)]
    async fn fixture_skips_short_and_processes_long_title() {
        let fixture = r#"{"articles":[{"title":"A","description":"d1","url":"u1"},{"title":"This headline is definitely long enough","description":"d2","url":"u2"}]}"#;
        let headlines = parse_headlines(fixture).unwrap();

        let log = Log::default();
        let mut p = pipeline(&log);
        let summary = p.run(&headlines).await.unwrap();

        let long = "This headline is definitely long enough";
        let narration = format!("Narrated: {long}");
        assert_eq!(
            calls(&log),
            vec![
                Call::NarrateStart(long.into()),
                Call::NarrateEnd(narration.clone()),
                Call::SpeakStart(narration.clone()),
                Call::SpeakEnd(narration),
            ]
        );
        assert_eq!(p.narrator.prompts.len(), 1);
        assert!(p.narrator.prompts[0].contains(crate::narrator::NEWSCASTER_PROMPT));
        assert!(p.narrator.prompts[0].contains(long));
        assert_eq!(
            summary,
            RunSummary {
                processed: 1,
                skipped: 1,
                ..RunSummary::default()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn short_titles_never_reach_narrator_or_speaker() {
        let log = Log::default();
        let mut p = pipeline(&log);
        let summary = p
            .run(&titles(&["", "Tiny", "Exactly twenty-five chars"]))
            .await
            .unwrap();
        assert!(calls(&log).is_empty());
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn each_narration_is_spoken_before_the_next_title() {
        let log = Log::default();
        let mut p = pipeline(&log);
        p.narrator.work = Duration::from_millis(300);
        p.speaker.work = Duration::from_millis(700);

        let input = titles(&[
            "First headline that is long enough",
            "short",
            "Second headline that is long enough",
            "Third headline that is long enough",
        ]);
        p.run(&input).await.unwrap();

        let expected: Vec<Call> = [&input[0], &input[2], &input[3]]
            .into_iter()
            .flat_map(|t| {
                let n = format!("Narrated: {t}");
                [
                    Call::NarrateStart(t.clone()),
                    Call::NarrateEnd(n.clone()),
                    Call::SpeakStart(n.clone()),
                    Call::SpeakEnd(n),
                ]
            })
            .collect();
        assert_eq!(calls(&log), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_qualifying_titles() {
        let log = Log::default();
        let mut p = pipeline(&log);
        p.speaker.work = Duration::from_millis(500);

        p.run(&titles(&[
            "First headline that is long enough",
            "Second headline that is long enough",
        ]))
        .await
        .unwrap();

        let log = log.lock().unwrap();
        let first_speak_end = log
            .iter()
            .find(|(_, c)| matches!(c, Call::SpeakEnd(_)))
            .map(|(t, _)| *t)
            .unwrap();
        let second_narrate_start = log
            .iter()
            .filter(|(_, c)| matches!(c, Call::NarrateStart(_)))
            .nth(1)
            .map(|(t, _)| *t)
            .unwrap();
        assert!(second_narrate_start - first_speak_end >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_threshold_and_delay_apply() {
        let log = Log::default();
        let config = PipelineConfig {
            min_title_len: 3,
            delay_secs: 0.0,
        };
        let mut p = Pipeline::new(
            FakeNarrator::new(log.clone()),
            FakeSpeaker {
                log: log.clone(),
                fail: false,
                work: Duration::ZERO,
            },
            &config,
        )
        .unwrap();
        let start = Instant::now();
        let summary = p.run(&titles(&["abc", "abcd", "abcde"])).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn speech_failures_do_not_stop_the_run() {
        let log = Log::default();
        let mut p = pipeline(&log);
        p.speaker.fail = true;

        let summary = p
            .run(&titles(&[
                "First headline that is long enough",
                "Second headline that is long enough",
            ]))
            .await
            .unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.speech_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn narration_error_aborts_remaining_titles() {
        let log = Log::default();
        let mut p = pipeline(&log);
        p.narrator.fail_on = Some("Second headline that is long enough".into());

        let err = p
            .run(&titles(&[
                "First headline that is long enough",
                "Second headline that is long enough",
                "Third headline that is long enough",
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, NarrationError::Status { .. }));

        let starts = calls(&log)
            .into_iter()
            .filter(|c| matches!(c, Call::NarrateStart(_)))
            .count();
        assert_eq!(starts, 2);
    }

    /// Answers every title with the same fixed outcome.
    struct FixedNarrator(Narration);

    #[async_trait]
    impl Narrator for FixedNarrator {
        async fn narrate(&mut self, _title: &str) -> Result<Narration, NarrationError> {
            Ok(self.0.clone())
        }
    }

    fn fixed_pipeline(narration: Narration, log: &Log) -> Pipeline<FixedNarrator, FakeSpeaker> {
        Pipeline::new(
            FixedNarrator(narration),
            FakeSpeaker {
                log: log.clone(),
                fail: false,
                work: Duration::ZERO,
            },
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_narration_is_still_spoken() {
        let log = Log::default();
        let mut p = fixed_pipeline(Narration::Fallback, &log);
        let summary = p
            .run(&titles(&["A headline long enough to be narrated"]))
            .await
            .unwrap();
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(
            calls(&log),
            vec![
                Call::SpeakStart(FALLBACK_NARRATION.into()),
                Call::SpeakEnd(FALLBACK_NARRATION.into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn model_text_equal_to_fallback_sentence_is_not_a_fallback() {
        let log = Log::default();
        let mut p = fixed_pipeline(Narration::Text(FALLBACK_NARRATION.into()), &log);
        let summary = p
            .run(&titles(&["A headline long enough to be narrated"]))
            .await
            .unwrap();
        assert_eq!(summary.fallbacks, 0);
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn unusable_delay_is_a_config_error() {
        for delay_secs in [f64::INFINITY, f64::NAN, -0.5, 1.0e300] {
            let log = Log::default();
            let config = PipelineConfig {
                delay_secs,
                ..PipelineConfig::default()
            };
            let result = Pipeline::new(
                FixedNarrator(Narration::Fallback),
                FakeSpeaker {
                    log: log.clone(),
                    fail: false,
                    work: Duration::ZERO,
                },
                &config,
            );
            assert!(
                matches!(result, Err(ConfigError::Invalid { key: "pipeline.delay_secs", .. })),
                "{delay_secs}"
            );
        }
    }
}
