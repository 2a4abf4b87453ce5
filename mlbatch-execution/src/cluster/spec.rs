//! Cluster resource specifications

use std::fmt;

/// How worker processes are started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterSpec {
    /// Run the bootstrap directly, without a workload manager
    Fake,

    /// Options passed to the workload manager launcher, e.g. `-n 4 -c 2`
    Launcher { options: Vec<String> },
}

/// Where and how the task count appears in the launcher options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskCountForm {
    /// `-n N`
    Short,
    /// `-nN`
    ShortJoined,
    /// `--ntasks N`
    Long,
    /// `--ntasks=N`
    LongEquals,
}

impl ClusterSpec {
    /// Parse a spec string; `fake` selects direct execution
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec == "fake" {
            return ClusterSpec::Fake;
        }
        ClusterSpec::Launcher {
            options: spec.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Tasks per worker requested through `-n`/`--ntasks`
    pub fn task_count(&self) -> Option<usize> {
        match self {
            ClusterSpec::Fake => None,
            ClusterSpec::Launcher { options } => find_task_count(options).map(|(_, _, n)| n),
        }
    }

    /// Fit the task count and the number of worker processes to the jobs
    ///
    /// With a task count `n`, `workers` processes and `jobs` jobs: when all
    /// jobs fit one process, that process gets exactly `jobs` tasks; when
    /// fewer processes would do, the process count drops to `ceil(jobs / n)`.
    /// Returns the adjusted spec and process count.
    pub fn reconcile(&self, workers: usize, jobs: usize) -> (ClusterSpec, usize) {
        let ClusterSpec::Launcher { options } = self else {
            return (self.clone(), workers);
        };
        let Some((position, form, n)) = find_task_count(options) else {
            return (self.clone(), workers);
        };

        if jobs <= n {
            let mut options = options.clone();
            set_task_count(&mut options, position, form, jobs);
            (ClusterSpec::Launcher { options }, 1)
        } else if jobs <= n * workers.saturating_sub(1) {
            (self.clone(), jobs.div_ceil(n))
        } else {
            (self.clone(), workers)
        }
    }

    /// Program and arguments launching one worker running `script`
    pub fn command_line(&self, launcher: &str, script: &str) -> (String, Vec<String>) {
        match self {
            ClusterSpec::Fake => ("bash".to_string(), vec![script.to_string()]),
            ClusterSpec::Launcher { options } => {
                let mut args = options.clone();
                args.push("bash".to_string());
                args.push(script.to_string());
                (launcher.to_string(), args)
            }
        }
    }
}

impl fmt::Display for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterSpec::Fake => write!(f, "fake"),
            ClusterSpec::Launcher { options } => write!(f, "{}", options.join(" ")),
        }
    }
}

fn find_task_count(options: &[String]) -> Option<(usize, TaskCountForm, usize)> {
    for (i, option) in options.iter().enumerate() {
        let next = || options.get(i + 1).and_then(|v| v.parse::<usize>().ok());
        match option.as_str() {
            "-n" => return next().map(|n| (i, TaskCountForm::Short, n)),
            "--ntasks" => return next().map(|n| (i, TaskCountForm::Long, n)),
            _ => {}
        }
        if let Some(value) = option.strip_prefix("--ntasks=") {
            return value.parse().ok().map(|n| (i, TaskCountForm::LongEquals, n));
        }
        if let Some(value) = option.strip_prefix("-n") {
            if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                return value.parse().ok().map(|n| (i, TaskCountForm::ShortJoined, n));
            }
        }
    }
    None
}

fn set_task_count(options: &mut [String], position: usize, form: TaskCountForm, n: usize) {
    match form {
        TaskCountForm::Short | TaskCountForm::Long => options[position + 1] = n.to_string(),
        TaskCountForm::ShortJoined => options[position] = format!("-n{}", n),
        TaskCountForm::LongEquals => options[position] = format!("--ntasks={}", n),
    }
}
