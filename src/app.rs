//! Reminder orchestrator: keeps the backlog full and sends one reminder per
//! occasion.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, bail};
use nudge_core::NudgeConfig;
use nudge_core::error::NudgeError;
use nudge_core::traits::{Generator, Transport};
use nudge_scheduler::{DebugChannel, JsonFileStore, MessageQueue, NotifyLevel, OccasionScheduler, QueueStore};

/// Pause between consecutive generation requests while filling the backlog.
const REFILL_PAUSE: Duration = Duration::from_secs(1);

pub struct ReminderApp<G, T, S = JsonFileStore>
where
    G: Generator,
    T: Transport,
    S: QueueStore,
{
    config: NudgeConfig,
    generator: G,
    transport: T,
    queue: MessageQueue<S>,
    scheduler: OccasionScheduler,
    debug: DebugChannel,
    refill_pause: Duration,
}

impl<G, T, S> ReminderApp<G, T, S>
where
    G: Generator,
    T: Transport,
    S: QueueStore,
{
    pub fn new(
        config: NudgeConfig,
        generator: G,
        transport: T,
        queue: MessageQueue<S>,
        scheduler: OccasionScheduler,
        debug: DebugChannel,
    ) -> Self {
        Self {
            config,
            generator,
            transport,
            queue,
            scheduler,
            debug,
            refill_pause: REFILL_PAUSE,
        }
    }

    pub fn with_refill_pause(mut self, pause: Duration) -> Self {
        self.refill_pause = pause;
        self
    }

    pub fn queue(&self) -> &MessageQueue<S> {
        &self.queue
    }

    pub fn scheduler(&self) -> &OccasionScheduler {
        &self.scheduler
    }

    fn cache_size(&self) -> usize {
        self.config.cache.cache_size
    }

    /// Generate one message and queue it. Returns whether the queue grew.
    pub async fn generate_and_enqueue(&self) -> bool {
        let recent = self
            .queue
            .recent_sent_for_context(self.config.cache.context_messages);
        let prompt = self.config.render_prompt(&recent);

        match self.generator.generate(&prompt).await {
            Ok(Some(message)) => match self.queue.enqueue(&message) {
                Ok(()) => true,
                Err(NudgeError::DuplicateMessage(_)) => {
                    tracing::warn!("⚠️ {} repeated an existing message, discarding it", self.generator.name());
                    false
                }
                Err(e) => {
                    tracing::error!("❌ Failed to store generated message: {e}");
                    self.debug
                        .report_error("Failed to store generated message", Some(&e))
                        .await;
                    false
                }
            },
            Ok(None) => {
                tracing::warn!("⚠️ {} produced no usable message", self.generator.name());
                false
            }
            Err(e) if e.is_fatal() => {
                tracing::error!("❌ Generation is misconfigured: {e}");
                self.debug
                    .report_error("Generation is misconfigured", Some(&e))
                    .await;
                false
            }
            Err(e) => {
                tracing::error!("❌ Error generating message: {e}");
                self.debug
                    .report_error("Failed to generate message", Some(&e))
                    .await;
                false
            }
        }
    }

    /// Repair the backlog, then fill it up to the configured size.
    ///
    /// Fails when messages were needed and none could be generated.
    pub async fn initialize_cache(&self) -> Result<usize> {
        tracing::info!("🔍 Validating existing cache...");
        let removed = self.queue.validate_and_repair()?;
        if removed > 0 {
            tracing::info!("🩹 Removed {removed} bad cache entries");
        }

        let needed = self.queue.needs_refill(self.cache_size());
        if needed == 0 {
            tracing::info!("✅ Cache already full ({} messages)", self.queue.count());
            return Ok(0);
        }

        tracing::info!("📝 Initializing cache with {needed} messages...");
        let mut generated = 0;
        for i in 0..needed {
            tracing::info!("Generating message {}/{needed}...", i + 1);
            if self.generate_and_enqueue().await {
                generated += 1;
            } else {
                tracing::warn!("⚠️ Failed to generate message {}", i + 1);
            }
            if i + 1 < needed && !self.refill_pause.is_zero() {
                tokio::time::sleep(self.refill_pause).await;
            }
        }

        tracing::info!("📦 Cache initialization complete: {generated}/{needed} messages generated");
        if generated == 0 {
            bail!("Failed to generate any cache messages");
        }
        Ok(generated)
    }

    /// Top the backlog up by one message if it is short.
    pub async fn refill_one(&self) {
        let needed = self.queue.needs_refill(self.cache_size());
        if needed == 0 {
            return;
        }
        tracing::info!("🔄 Cache needs refill ({needed} messages needed)");
        if self.generate_and_enqueue().await {
            tracing::info!("✅ Successfully refilled cache");
        } else {
            tracing::warn!("⚠️ Failed to refill cache");
        }
    }

    /// Send the oldest queued message. Returns whether it was delivered.
    ///
    /// A failed delivery puts the message back at the end of the queue.
    pub async fn send_reminder(&self) -> bool {
        let message = match self.queue.dequeue_oldest() {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::error!("❌ No cached message available");
                self.debug
                    .report_error("Cache is empty, cannot send reminder", None)
                    .await;
                return false;
            }
            Err(e) => {
                tracing::error!("❌ Failed to read from cache: {e}");
                self.debug.report_error("Error reading cache", Some(&e)).await;
                return false;
            }
        };

        tracing::info!("📨 Sending message: {}", preview(&message, 100));
        match self.transport.send(&message).await {
            Ok(()) => {
                tracing::info!("✅ Reminder sent successfully via {}", self.transport.name());
                if let Err(e) = self.queue.record_sent(&message) {
                    tracing::error!("❌ Failed to record sent message: {e}");
                }
                self.refill_one().await;
                true
            }
            Err(e) => {
                tracing::error!("❌ Failed to send reminder: {e}");
                self.debug.report_error("Error sending reminder", Some(&e)).await;
                tracing::info!("↩️ Re-adding message to cache");
                if let Err(e) = self.queue.enqueue(&message) {
                    tracing::error!("❌ Failed to requeue message: {e}");
                }
                false
            }
        }
    }

    /// One scheduler check at `now`. Returns whether a send was attempted.
    pub async fn tick_at(&mut self, now: chrono::NaiveDateTime) -> bool {
        if !self.scheduler.is_due_at(now) {
            return false;
        }
        tracing::debug!("Scheduler indicates it's time to send reminder");
        self.send_reminder().await;
        self.scheduler.compute_next_at(now);
        true
    }

    /// Fill the backlog, then poll until `shutdown` resolves.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        if let Err(e) = self.initialize_cache().await {
            self.debug
                .report_error("Application crashed", Some(&e))
                .await;
            return Err(e);
        }

        self.scheduler.compute_next();
        tracing::info!("🚀 Application running. Press Ctrl+C to stop.");
        self.debug.report(NotifyLevel::Info, "Reminder service started").await;

        tokio::pin!(shutdown);
        loop {
            self.tick_at(chrono::Local::now().naive_local()).await;
            let interval = self.scheduler.poll_interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("🛑 Application stopped by user");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// At most `max_chars` characters, with `...` when cut.
pub(crate) fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Returns scripted replies, then numbered messages.
    #[derive(Default)]
    struct ScriptedGenerator {
        script: Mutex<VecDeque<nudge_core::Result<Option<String>>>>,
        prompts: Mutex<Vec<String>>,
        counter: AtomicUsize,
        always_none: bool,
    }

    impl ScriptedGenerator {
        fn failing() -> Self {
            Self {
                always_none: true,
                ..Self::default()
            }
        }

        fn with_script(script: Vec<nudge_core::Result<Option<String>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> nudge_core::Result<Option<String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(reply) = self.script.lock().unwrap().pop_front() {
                return reply;
            }
            if self.always_none {
                return Ok(None);
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("Generated reminder number {n}")))
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, content: &str) -> nudge_core::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NudgeError::Transport("webhook down".into()));
            }
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    fn test_config(cache_size: usize) -> NudgeConfig {
        let mut config = NudgeConfig::default();
        config.webhook.main_url = "http://localhost/hook".into();
        config.reminder.target_name = "Ola".into();
        config.reminder.sender_name = "Tomek".into();
        config.reminder.book_title = "Solaris".into();
        config.reminder.randomize_time = false;
        config.reminder.time_range.start = "15:00".into();
        config.cache.cache_size = cache_size;
        config.cache.context_messages = 2;
        config
    }

    fn app_in(
        dir: &std::path::Path,
        cache_size: usize,
        generator: ScriptedGenerator,
    ) -> ReminderApp<ScriptedGenerator, RecordingTransport> {
        let config = test_config(cache_size);
        let queue = MessageQueue::new(JsonFileStore::new(dir).unwrap());
        let scheduler = OccasionScheduler::from_config(&config.reminder).unwrap();
        ReminderApp::new(
            config,
            generator,
            RecordingTransport::default(),
            queue,
            scheduler,
            DebugChannel::disabled(),
        )
        .with_refill_pause(Duration::ZERO)
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_fills_cache() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 3, ScriptedGenerator::default());
        assert_eq!(app.initialize_cache().await.unwrap(), 3);
        assert_eq!(app.queue().count(), 3);

        // Already full: nothing to do.
        assert_eq!(app.initialize_cache().await.unwrap(), 0);
        assert_eq!(app.generator.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_nothing_generated() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 3, ScriptedGenerator::failing());
        assert!(app.initialize_cache().await.is_err());
        assert_eq!(app.generator.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_initialize_partial_success_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator::with_script(vec![
            Err(NudgeError::Provider("overloaded".into())),
            Ok(None),
        ]);
        let app = app_in(dir.path(), 3, generator);
        assert_eq!(app.initialize_cache().await.unwrap(), 1);
        assert_eq!(app.queue().count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_generation_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ScriptedGenerator::with_script(vec![
            Ok(Some("Read Solaris tonight, Ola!".into())),
            Ok(Some("Read Solaris tonight, Ola!".into())),
        ]);
        let app = app_in(dir.path(), 5, generator);
        assert!(app.generate_and_enqueue().await);
        assert!(!app.generate_and_enqueue().await);
        assert_eq!(app.queue().count(), 1);
    }

    #[tokio::test]
    async fn test_send_success_records_and_refills() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 2, ScriptedGenerator::default());
        app.initialize_cache().await.unwrap();

        assert!(app.send_reminder().await);
        assert_eq!(
            *app.transport.sent.lock().unwrap(),
            vec!["Generated reminder number 0".to_string()]
        );
        let sent = app.queue().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Generated reminder number 0");
        // Refilled back to the target size.
        assert_eq!(app.queue().count(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_requeues() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 2, ScriptedGenerator::default());
        app.initialize_cache().await.unwrap();
        app.transport.fail.store(true, Ordering::SeqCst);

        assert!(!app.send_reminder().await);
        assert!(app.queue().sent().is_empty());
        let texts: Vec<String> = app.queue().pending().into_iter().map(|e| e.text).collect();
        assert_eq!(
            texts,
            vec!["Generated reminder number 1", "Generated reminder number 0"]
        );
    }

    #[tokio::test]
    async fn test_send_with_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 2, ScriptedGenerator::default());
        assert!(!app.send_reminder().await);
        assert!(app.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_recent_messages() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), 1, ScriptedGenerator::default());
        app.initialize_cache().await.unwrap();
        app.send_reminder().await;

        let prompts = app.generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("(none yet)"));
        assert!(prompts[0].contains("Solaris"));
        // The refill after the send sees the sent message.
        assert!(prompts[1].contains("- Generated reminder number 0"));
    }

    #[tokio::test]
    async fn test_tick_sends_once_per_occasion() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path(), 2, ScriptedGenerator::default());
        app.initialize_cache().await.unwrap();

        // First check only arms (today 15:00 is still ahead).
        assert!(!app.tick_at(at(10, 9, 0)).await);
        assert_eq!(app.scheduler().next_occasion(), Some(at(10, 15, 0)));
        assert!(!app.tick_at(at(10, 14, 59)).await);

        assert!(app.tick_at(at(10, 15, 0)).await);
        assert_eq!(app.transport.sent.lock().unwrap().len(), 1);
        assert_eq!(app.scheduler().next_occasion(), Some(at(11, 15, 0)));

        assert!(!app.tick_at(at(10, 15, 5)).await);
        assert_eq!(app.transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path(), 2, ScriptedGenerator::default());
        app.run(std::future::ready(())).await.unwrap();
        assert_eq!(app.queue().count(), 2);
        assert!(app.scheduler().next_occasion().is_some());
    }

    #[tokio::test]
    async fn test_run_fails_without_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path(), 2, ScriptedGenerator::failing());
        assert!(app.run(std::future::ready(())).await.is_err());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ąćęłńóśźż!", 3), "ąćę...");
    }
}
