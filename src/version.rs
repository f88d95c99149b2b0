use std::sync::LazyLock;

pub(crate) const NAME: &str = env!("CARGO_PKG_NAME");
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub(crate) const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");

pub(crate) static VERSION_STRING: LazyLock<String> = LazyLock::new(|| {
    match (GIT_REV, GIT_BRANCH) {
        (Some(rev), Some(branch)) => format!("{VERSION} rev {rev} ({branch})"),
        (Some(rev), None) => format!("{VERSION} rev {rev}"),
        _ => VERSION.to_owned(),
    }
});
