use biometrics::{Collector, Counter, Moments};

pub(crate) static STREAM_REQUESTS: Counter = Counter::new("aion.stream.requests");
pub(crate) static STREAM_REJECTIONS: Counter = Counter::new("aion.stream.rejections");
pub(crate) static STREAM_CONNECTION_FAILURES: Counter =
    Counter::new("aion.stream.connection_failures");
pub(crate) static STREAM_INTERRUPTIONS: Counter = Counter::new("aion.stream.interruptions");
pub(crate) static STREAM_ABORTS: Counter = Counter::new("aion.stream.aborts");
pub(crate) static STREAM_COMPLETIONS: Counter = Counter::new("aion.stream.completions");
pub(crate) static STREAM_CHUNKS: Counter = Counter::new("aion.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("aion.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("aion.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("aion.stream.duration_seconds");

pub(crate) static CHAT_SUBMISSIONS: Counter = Counter::new("aion.chat.submissions");
pub(crate) static CHAT_EMPTY_SUBMISSIONS: Counter = Counter::new("aion.chat.empty_submissions");
pub(crate) static CHAT_PROVIDER_SWITCHES: Counter = Counter::new("aion.chat.provider_switches");
pub(crate) static CHAT_HEALTH_CHECKS: Counter = Counter::new("aion.chat.health_checks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&STREAM_REQUESTS);
    collector.register_counter(&STREAM_REJECTIONS);
    collector.register_counter(&STREAM_CONNECTION_FAILURES);
    collector.register_counter(&STREAM_INTERRUPTIONS);
    collector.register_counter(&STREAM_ABORTS);
    collector.register_counter(&STREAM_COMPLETIONS);
    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CHAT_SUBMISSIONS);
    collector.register_counter(&CHAT_EMPTY_SUBMISSIONS);
    collector.register_counter(&CHAT_PROVIDER_SWITCHES);
    collector.register_counter(&CHAT_HEALTH_CHECKS);
}
