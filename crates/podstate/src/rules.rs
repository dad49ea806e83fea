//! Pod and container condition checks.
//!
//! Every check is a total function of the evaluation context returning the
//! message of the condition it detects, or `None`. Missing data never
//! fails a check; it simply does not match.
//!
//! Container checks run in a fixed order and the first match wins, so the
//! order of [`INIT_CONTAINER_CHECKS`] and [`CONTAINER_CHECKS`] decides which
//! message users see when several conditions hold at once:
//!
//! 1. `container_creating`
//! 2. `container_config_error`
//! 3. `container_image_pull_back_off`
//! 4. `container_crash_loop_back_off`
//! 5. `container_oom_killed`
//! 6. `container_max_restart`
//! 7. init containers: `init_container_failure`;
//!    regular containers: `container_not_ready`, then `container_restart_rate`

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::CheckConfig;
use crate::naming::{container_id, container_slug, pod_id, pod_slug, uc_first, ContainerKind};
use crate::pod::{EntityResult, Outcome, Pod};
use crate::status::{ContainerStatus, PodPhase, PodStatus};

/// Pods younger than this many days are not rate checked.
pub const RESTART_RATE_MIN_AGE_DAYS: f64 = 0.1;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Everything a pod-level check can look at.
#[derive(Debug, Clone, Copy)]
pub struct PodContext<'a> {
    pub now: DateTime<Utc>,
    pub config: &'a CheckConfig,
    pub pod: &'a Pod,
    pub status: &'a PodStatus,
}

impl<'a> PodContext<'a> {
    pub fn container(
        self,
        container: &'a ContainerStatus,
        kind: ContainerKind,
    ) -> ContainerContext<'a> {
        ContainerContext {
            pod: self,
            container,
            kind,
        }
    }
}

/// Pod context narrowed to one container.
#[derive(Debug, Clone, Copy)]
pub struct ContainerContext<'a> {
    pub pod: PodContext<'a>,
    pub container: &'a ContainerStatus,
    pub kind: ContainerKind,
}

impl ContainerContext<'_> {
    fn config(&self) -> &CheckConfig {
        self.pod.config
    }

    fn slug(&self) -> String {
        container_slug(self.pod.pod, self.container, self.kind)
    }
}

/// A named container check.
#[derive(Debug, Clone, Copy)]
pub struct ContainerCheck {
    pub name: &'static str,
    pub run: fn(&ContainerContext<'_>) -> Option<String>,
}

/// Checks for init containers, in precedence order.
pub const INIT_CONTAINER_CHECKS: &[ContainerCheck] = &[
    ContainerCheck {
        name: "container_creating",
        run: container_creating,
    },
    ContainerCheck {
        name: "container_config_error",
        run: container_config_error,
    },
    ContainerCheck {
        name: "container_image_pull_back_off",
        run: container_image_pull_back_off,
    },
    ContainerCheck {
        name: "container_crash_loop_back_off",
        run: container_crash_loop_back_off,
    },
    ContainerCheck {
        name: "container_oom_killed",
        run: container_oom_killed,
    },
    ContainerCheck {
        name: "container_max_restart",
        run: container_max_restart,
    },
    ContainerCheck {
        name: "init_container_failure",
        run: init_container_failure,
    },
];

/// Checks for regular containers, in precedence order.
pub const CONTAINER_CHECKS: &[ContainerCheck] = &[
    ContainerCheck {
        name: "container_creating",
        run: container_creating,
    },
    ContainerCheck {
        name: "container_config_error",
        run: container_config_error,
    },
    ContainerCheck {
        name: "container_image_pull_back_off",
        run: container_image_pull_back_off,
    },
    ContainerCheck {
        name: "container_crash_loop_back_off",
        run: container_crash_loop_back_off,
    },
    ContainerCheck {
        name: "container_oom_killed",
        run: container_oom_killed,
    },
    ContainerCheck {
        name: "container_max_restart",
        run: container_max_restart,
    },
    ContainerCheck {
        name: "container_not_ready",
        run: container_not_ready,
    },
    ContainerCheck {
        name: "container_restart_rate",
        run: container_restart_rate,
    },
];

/// The checks that apply to a container of the given kind.
pub fn checks_for(kind: ContainerKind) -> &'static [ContainerCheck] {
    match kind {
        ContainerKind::Init => INIT_CONTAINER_CHECKS,
        ContainerKind::Regular => CONTAINER_CHECKS,
    }
}

/// Run `checks` in order and return the first match with its check name.
///
/// The returned message has its first letter capitalized.
pub fn first_match(
    checks: &[ContainerCheck],
    ctx: &ContainerContext<'_>,
) -> Option<(&'static str, String)> {
    checks
        .iter()
        .find_map(|check| (check.run)(ctx).map(|message| (check.name, uc_first(&message))))
}

/// True if more than `seconds` have elapsed from `since` to `now`.
fn older_than(now: DateTime<Utc>, since: DateTime<Utc>, seconds: u64) -> bool {
    match i64::try_from(seconds).ok().and_then(TimeDelta::try_seconds) {
        Some(threshold) => now - since > threshold,
        None => false,
    }
}

/// Results for a deleted pod: the pod and each regular container, all removed.
///
/// Returns `None` unless the pod phase is `Deleted`.
pub fn pod_deleted(ctx: &PodContext<'_>) -> Option<Vec<EntityResult>> {
    if ctx.status.phase != PodPhase::Deleted {
        return None;
    }
    let slug = pod_slug(ctx.pod);
    let mut results = vec![EntityResult {
        id: pod_id(ctx.pod),
        outcome: Outcome::Removed(uc_first(&format!("{slug} was deleted"))),
        slug,
    }];
    for container in &ctx.status.container_statuses {
        let slug = container_slug(ctx.pod, container, ContainerKind::Regular);
        results.push(EntityResult {
            id: container_id(ctx.pod, container, ContainerKind::Regular),
            outcome: Outcome::Removed(uc_first(&format!("{slug} was deleted"))),
            slug,
        });
    }
    Some(results)
}

/// Pod has been unschedulable for longer than the configured delay.
pub fn pod_unscheduled(ctx: &PodContext<'_>) -> Option<String> {
    let delay = ctx.config.not_scheduled_delay_seconds;
    if delay == 0 {
        return None;
    }
    let created_at = ctx.pod.created_at?;
    let condition = ctx.status.condition("PodScheduled", "Unschedulable")?;
    if !older_than(ctx.now, created_at, delay) {
        return None;
    }
    Some(uc_first(&format!(
        "{} has not been scheduled: `{}`",
        pod_slug(ctx.pod),
        condition.message.as_deref().unwrap_or_default()
    )))
}

/// Container has been in `ContainerCreating` longer than the configured delay.
pub fn container_creating(ctx: &ContainerContext<'_>) -> Option<String> {
    let delay = ctx.config().not_created_seconds;
    if delay == 0 {
        return None;
    }
    let created_at = ctx.pod.pod.created_at?;
    if ctx.container.waiting_reason() != Some("ContainerCreating") {
        return None;
    }
    if !older_than(ctx.pod.now, created_at, delay) {
        return None;
    }
    Some(format!("{} has been creating too long", ctx.slug()))
}

fn waiting_in(ctx: &ContainerContext<'_>, enabled: bool, reason: &str) -> Option<String> {
    if !enabled {
        return None;
    }
    let waiting = ctx.container.waiting()?;
    if waiting.reason.as_deref() != Some(reason) {
        return None;
    }
    Some(format!(
        "{} is in {}: `{}`",
        ctx.slug(),
        reason,
        waiting.message.as_deref().unwrap_or_default()
    ))
}

/// Container is waiting in `CreateContainerConfigError`.
pub fn container_config_error(ctx: &ContainerContext<'_>) -> Option<String> {
    waiting_in(
        ctx,
        ctx.config().create_container_config_error,
        "CreateContainerConfigError",
    )
}

/// Container is waiting in `ImagePullBackOff`.
pub fn container_image_pull_back_off(ctx: &ContainerContext<'_>) -> Option<String> {
    waiting_in(ctx, ctx.config().image_pull_back_off, "ImagePullBackOff")
}

/// Container is waiting in `CrashLoopBackOff`.
pub fn container_crash_loop_back_off(ctx: &ContainerContext<'_>) -> Option<String> {
    waiting_in(ctx, ctx.config().crash_loop_back_off, "CrashLoopBackOff")
}

/// Container terminated because it ran out of memory.
pub fn container_oom_killed(ctx: &ContainerContext<'_>) -> Option<String> {
    if !ctx.config().oom_killed {
        return None;
    }
    let terminated = ctx.container.terminated()?;
    if terminated.reason.as_deref() != Some("OOMKilled") {
        return None;
    }
    Some(format!(
        "{} has been OOMKilled: `{}`",
        ctx.slug(),
        terminated.exit_code
    ))
}

/// Container restart count reached the configured maximum.
pub fn container_max_restart(ctx: &ContainerContext<'_>) -> Option<String> {
    let max = ctx.config().max_restarts;
    let restarts = ctx.container.restart_count;
    if max == 0 || restarts < max {
        return None;
    }
    Some(format!(
        "{} has restarted too many times: `{} > {}`",
        ctx.slug(),
        restarts,
        max
    ))
}

/// Init container keeps exiting with an error.
pub fn init_container_failure(ctx: &ContainerContext<'_>) -> Option<String> {
    let threshold = ctx.config().init_container_failure_count;
    if !ctx.kind.is_init() || threshold == 0 {
        return None;
    }
    let terminated = ctx.container.terminated()?;
    if terminated.reason.as_deref() != Some("Error") || ctx.container.restart_count < threshold {
        return None;
    }
    Some(format!("{} failed: `{}`", ctx.slug(), terminated.exit_code))
}

/// Running container has not become ready within the configured delay.
///
/// Waiting and terminated containers are never reported as not ready, and
/// init containers have no lasting readiness.
pub fn container_not_ready(ctx: &ContainerContext<'_>) -> Option<String> {
    let delay = ctx.config().not_ready_delay_seconds;
    if ctx.kind.is_init() || delay == 0 {
        return None;
    }
    if ctx.container.waiting().is_some() {
        return None;
    }
    let start_time = ctx.pod.status.start_time?;
    if ctx.container.ready != Some(false) {
        return None;
    }
    ctx.container.running()?;
    if !older_than(ctx.pod.now, start_time, delay) {
        return None;
    }
    Some(format!("{} is not ready", ctx.slug()))
}

/// Container restarts faster than the configured daily rate.
pub fn container_restart_rate(ctx: &ContainerContext<'_>) -> Option<String> {
    let rate = ctx.config().restarts_per_day;
    if ctx.kind.is_init() || rate <= 0.0 {
        return None;
    }
    let start_time = ctx.pod.status.start_time?;
    let restarts = ctx.container.restart_count;
    if restarts == 0 {
        return None;
    }
    let age_days = (ctx.pod.now - start_time).num_milliseconds() as f64 / MILLIS_PER_DAY;
    if age_days <= RESTART_RATE_MIN_AGE_DAYS {
        return None;
    }
    if f64::from(restarts) / age_days <= rate {
        return None;
    }
    Some(format!(
        "{} restarts have exceeded acceptable rate: {} restarts over {:.1} days",
        ctx.slug(),
        restarts,
        age_days
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ContainerState, Running, Terminated, Waiting};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 19, 20, 23, 9).unwrap()
    }

    fn pod(age_seconds: i64) -> Pod {
        Pod::new("k8s", "production", "web").with_created_at(now() - TimeDelta::seconds(age_seconds))
    }

    fn container(state: Option<ContainerState>) -> ContainerStatus {
        ContainerStatus {
            name: "app".to_string(),
            image: "busybox".to_string(),
            ready: Some(false),
            restart_count: 0,
            state,
        }
    }

    fn waiting(reason: &str, message: &str) -> Option<ContainerState> {
        Some(ContainerState::Waiting(Waiting {
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }))
    }

    fn running() -> Option<ContainerState> {
        Some(ContainerState::Running(Running { started_at: None }))
    }

    fn terminated(reason: &str, exit_code: i32) -> Option<ContainerState> {
        Some(ContainerState::Terminated(Terminated {
            exit_code,
            reason: Some(reason.to_string()),
            ..Terminated::default()
        }))
    }

    fn all_enabled() -> CheckConfig {
        CheckConfig::builder()
            .crash_loop_back_off(true)
            .image_pull_back_off(true)
            .oom_killed(true)
            .create_container_config_error(true)
            .max_restarts(10)
            .init_container_failure_count(3)
            .not_ready_delay_seconds(600)
            .not_scheduled_delay_seconds(600)
            .not_created_seconds(600)
            .build()
            .unwrap()
    }

    fn run(
        config: &CheckConfig,
        pod: &Pod,
        status: &PodStatus,
        c: &ContainerStatus,
        kind: ContainerKind,
    ) -> Option<(&'static str, String)> {
        let ctx = PodContext {
            now: now(),
            config,
            pod,
            status,
        };
        first_match(checks_for(kind), &ctx.container(c, kind))
    }

    #[test]
    fn test_max_restart_threshold_is_inclusive() {
        let config = all_enabled();
        let p = pod(3600);
        let status = PodStatus::default();
        let mut c = container(running());
        c.ready = Some(true);

        c.restart_count = 10;
        let (name, message) = run(&config, &p, &status, &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_max_restart");
        assert!(message.ends_with("has restarted too many times: `10 > 10`"));

        c.restart_count = 9;
        assert_eq!(run(&config, &p, &status, &c, ContainerKind::Regular), None);
    }

    #[test]
    fn test_max_restart_disabled() {
        let config = CheckConfig::builder().build().unwrap();
        let mut c = container(running());
        c.restart_count = 1000;
        assert_eq!(
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular),
            None
        );
    }

    #[test]
    fn test_not_ready_delay_is_exclusive() {
        let config = all_enabled();
        let p = pod(0);
        let c = container(running());

        let status = PodStatus {
            start_time: Some(now() - TimeDelta::seconds(600)),
            ..PodStatus::default()
        };
        assert_eq!(run(&config, &p, &status, &c, ContainerKind::Regular), None);

        let status = PodStatus {
            start_time: Some(now() - TimeDelta::seconds(601)),
            ..PodStatus::default()
        };
        let (name, message) = run(&config, &p, &status, &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_not_ready");
        assert_eq!(
            message,
            "Container app (busybox) of pod production/web in Kubernetes cluster k8s is not ready"
        );
    }

    #[test]
    fn test_not_ready_needs_running_unready_container() {
        let config = all_enabled();
        let p = pod(0);
        let status = PodStatus {
            start_time: Some(now() - TimeDelta::hours(1)),
            ..PodStatus::default()
        };

        let terminated_container = container(terminated("Error", 143));
        assert_eq!(
            run(&config, &p, &status, &terminated_container, ContainerKind::Regular),
            None
        );

        let mut unknown = container(running());
        unknown.ready = None;
        assert_eq!(run(&config, &p, &status, &unknown, ContainerKind::Regular), None);

        let no_state = container(None);
        assert_eq!(run(&config, &p, &status, &no_state, ContainerKind::Regular), None);

        let init = container(running());
        assert_eq!(run(&config, &p, &status, &init, ContainerKind::Init), None);
    }

    #[test]
    fn test_not_ready_without_start_time() {
        let config = all_enabled();
        let c = container(running());
        assert_eq!(
            run(&config, &pod(3600), &PodStatus::default(), &c, ContainerKind::Regular),
            None
        );
    }

    #[test]
    fn test_image_pull_back_off_message() {
        let config = all_enabled();
        let c = container(waiting("ImagePullBackOff", r#"Back-off pulling image "x:y""#));
        let (name, message) =
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_image_pull_back_off");
        assert_eq!(
            message,
            "Container app (busybox) of pod production/web in Kubernetes cluster k8s is in ImagePullBackOff: `Back-off pulling image \"x:y\"`"
        );
    }

    #[test]
    fn test_toggles_disable_waiting_checks() {
        let config = CheckConfig::builder().max_restarts(10).build().unwrap();
        for reason in [
            "ImagePullBackOff",
            "CrashLoopBackOff",
            "CreateContainerConfigError",
        ] {
            let c = container(waiting(reason, "m"));
            assert_eq!(
                run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular),
                None
            );
        }
    }

    #[test]
    fn test_waiting_precedes_restart_count() {
        let config = all_enabled();
        let mut c = container(waiting("CrashLoopBackOff", "Back-off 20s"));
        c.restart_count = 50;
        let (name, message) =
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_crash_loop_back_off");
        assert!(message.ends_with("is in CrashLoopBackOff: `Back-off 20s`"));
    }

    #[test]
    fn test_container_creating_uses_pod_age() {
        let config = all_enabled();
        let c = container(waiting("ContainerCreating", ""));
        assert_eq!(
            run(&config, &pod(600), &PodStatus::default(), &c, ContainerKind::Regular),
            None
        );
        let (name, message) =
            run(&config, &pod(601), &PodStatus::default(), &c, ContainerKind::Init).unwrap();
        assert_eq!(name, "container_creating");
        assert_eq!(
            message,
            "Init container app (busybox) of pod production/web in Kubernetes cluster k8s has been creating too long"
        );
    }

    #[test]
    fn test_container_creating_without_creation_time() {
        let config = all_enabled();
        let c = container(waiting("ContainerCreating", ""));
        let p = Pod::new("k8s", "production", "web");
        assert_eq!(run(&config, &p, &PodStatus::default(), &c, ContainerKind::Regular), None);
    }

    #[test]
    fn test_oom_killed() {
        let config = all_enabled();
        let c = container(terminated("OOMKilled", 137));
        let (name, message) =
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_oom_killed");
        assert!(message.ends_with("has been OOMKilled: `137`"));
    }

    #[test]
    fn test_init_container_failure() {
        let config = all_enabled();
        let mut c = container(terminated("Error", 1));
        c.restart_count = 3;
        let (name, message) =
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Init).unwrap();
        assert_eq!(name, "init_container_failure");
        assert_eq!(
            message,
            "Init container app (busybox) of pod production/web in Kubernetes cluster k8s failed: `1`"
        );

        c.restart_count = 2;
        assert_eq!(
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Init),
            None
        );
    }

    #[test]
    fn test_init_container_failure_only_for_init() {
        let config = all_enabled();
        let mut c = container(terminated("Error", 1));
        c.restart_count = 5;
        assert_eq!(
            run(&config, &pod(0), &PodStatus::default(), &c, ContainerKind::Regular),
            None
        );
    }

    #[test]
    fn test_restart_rate() {
        let config = CheckConfig::builder().restarts_per_day(5.0).build().unwrap();
        let mut c = container(running());
        c.ready = Some(true);
        c.restart_count = 12;

        let status = PodStatus {
            start_time: Some(now() - TimeDelta::days(2)),
            ..PodStatus::default()
        };
        let (name, message) = run(&config, &pod(0), &status, &c, ContainerKind::Regular).unwrap();
        assert_eq!(name, "container_restart_rate");
        assert!(message.ends_with("restarts have exceeded acceptable rate: 12 restarts over 2.0 days"));

        c.restart_count = 10;
        assert_eq!(run(&config, &pod(0), &status, &c, ContainerKind::Regular), None);
    }

    #[test]
    fn test_restart_rate_skips_young_pods() {
        let config = CheckConfig::builder().restarts_per_day(1.0).build().unwrap();
        let mut c = container(running());
        c.restart_count = 5;
        let status = PodStatus {
            start_time: Some(now() - TimeDelta::hours(2)),
            ..PodStatus::default()
        };
        assert_eq!(run(&config, &pod(0), &status, &c, ContainerKind::Regular), None);
    }

    #[test]
    fn test_unscheduled() {
        let config = all_enabled();
        let status = PodStatus {
            phase: PodPhase::Pending,
            conditions: vec![crate::status::PodCondition {
                condition_type: "PodScheduled".to_string(),
                status: "False".to_string(),
                reason: Some("Unschedulable".to_string()),
                message: Some("0/1 nodes are available".to_string()),
                last_transition_time: None,
            }],
            ..PodStatus::default()
        };
        let old = pod(20 * 60);
        let ctx = PodContext {
            now: now(),
            config: &config,
            pod: &old,
            status: &status,
        };
        assert_eq!(
            pod_unscheduled(&ctx).as_deref(),
            Some("Pod production/web in Kubernetes cluster k8s has not been scheduled: `0/1 nodes are available`")
        );

        let young = pod(5 * 60);
        let ctx = PodContext { pod: &young, ..ctx };
        assert_eq!(pod_unscheduled(&ctx), None);
    }

    #[test]
    fn test_older_than_overflow() {
        assert!(!older_than(now(), now() - TimeDelta::days(1), u64::MAX));
    }
}
