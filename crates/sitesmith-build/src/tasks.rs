//! Task names and series/parallel composition.

use std::fmt;
use std::str::FromStr;

/// A named pipeline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Clean,
    Html,
    Styles,
    VendorStyles,
    Scripts,
    VendorScripts,
    Images,
    Serve,
}

impl TaskName {
    /// Tasks that transform source files into the output directory.
    pub const ASSETS: [TaskName; 6] = [
        TaskName::Html,
        TaskName::Styles,
        TaskName::VendorStyles,
        TaskName::Scripts,
        TaskName::VendorScripts,
        TaskName::Images,
    ];

    /// Name used on the command line and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Clean => "clean",
            TaskName::Html => "html",
            TaskName::Styles => "styles",
            TaskName::VendorStyles => "vendor-styles",
            TaskName::Scripts => "scripts",
            TaskName::VendorScripts => "vendor-scripts",
            TaskName::Images => "images",
            TaskName::Serve => "serve",
        }
    }

    /// Whether the task writes stylesheets only.
    pub fn is_style(&self) -> bool {
        matches!(self, TaskName::Styles | TaskName::VendorStyles)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = TaskName::ASSETS
            .into_iter()
            .chain([TaskName::Clean, TaskName::Serve]);

        for task in all {
            if task.as_str() == s {
                return Ok(task);
            }
        }

        Err(format!("unknown task '{}'", s))
    }
}

/// A composition of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Run a single task
    Task(TaskName),

    /// Run children one after another, stopping at the first failure
    Series(Vec<Plan>),

    /// Run children concurrently and wait for all of them
    Parallel(Vec<Plan>),
}

impl Plan {
    /// `clean`, then every asset task in parallel.
    pub fn build() -> Self {
        Plan::Series(vec![
            Plan::Task(TaskName::Clean),
            Plan::Parallel(TaskName::ASSETS.into_iter().map(Plan::Task).collect()),
        ])
    }

    /// `build`, then `serve`.
    pub fn default_plan() -> Self {
        Plan::Series(vec![Plan::build(), Plan::Task(TaskName::Serve)])
    }

    /// Leaf tasks in the order they are started.
    pub fn flatten(&self) -> Vec<TaskName> {
        let mut tasks = Vec::new();
        self.collect_into(&mut tasks);
        tasks
    }

    fn collect_into(&self, tasks: &mut Vec<TaskName>) {
        match self {
            Plan::Task(task) => tasks.push(*task),
            Plan::Series(children) | Plan::Parallel(children) => {
                for child in children {
                    child.collect_into(tasks);
                }
            }
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Plan::Task(task) => return write!(f, "{}", task),
            Plan::Series(children) => ("series", children),
            Plan::Parallel(children) => ("parallel", children),
        };

        write!(f, "{}(", name)?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_always_cleans_first() {
        let tasks = Plan::build().flatten();

        assert_eq!(tasks[0], TaskName::Clean);
        assert_eq!(tasks.iter().filter(|t| **t == TaskName::Clean).count(), 1);
        for asset in TaskName::ASSETS {
            assert!(tasks.contains(&asset), "build is missing {}", asset);
        }
    }

    #[test]
    fn default_builds_then_serves() {
        let tasks = Plan::default_plan().flatten();

        assert_eq!(tasks.first(), Some(&TaskName::Clean));
        assert_eq!(tasks.last(), Some(&TaskName::Serve));
    }

    #[test]
    fn renders_plans() {
        assert_eq!(
            Plan::build().to_string(),
            "series(clean, parallel(html, styles, vendor-styles, scripts, vendor-scripts, images))"
        );
    }

    #[test]
    fn parses_task_names() {
        assert_eq!("vendor-styles".parse::<TaskName>(), Ok(TaskName::VendorStyles));
        assert_eq!("clean".parse::<TaskName>(), Ok(TaskName::Clean));
        assert!("deploy".parse::<TaskName>().is_err());
    }
}
