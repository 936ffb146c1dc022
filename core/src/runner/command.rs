use crate::context::Context;
use crate::executor::types::{TaskSpec, GATEWAY_TARGET};

/// A task's command template resolved against one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCommand {
    pub program: String,
    pub args: Vec<String>,
    pub target: Option<String>,
    /// The substituted command line as written in reports.
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The task applies to this platform but cannot run in this context.
    Skip(String),
    /// The template itself is unusable.
    Invalid(String),
}

pub fn bind(spec: &TaskSpec, ctx: &Context) -> Result<BoundCommand, BindError> {
    if spec.ipv6 && !ctx.options.ipv6 {
        return Err(BindError::Skip("IPv6 tests disabled".to_string()));
    }

    let template = spec.command.for_platform(ctx.platform).ok_or_else(|| {
        BindError::Invalid(format!("no command template for {}", ctx.platform))
    })?;

    let target = match spec.target.as_deref() {
        Some(GATEWAY_TARGET) => {
            let family = if spec.ipv6 { 6 } else { 4 };
            let gw = ctx
                .gateway(spec.ipv6)
                .ok_or_else(|| BindError::Skip(format!("IPv{family} gateway not determined")))?;
            Some(gw.to_string())
        }
        Some(t) => Some(t.to_string()),
        None => None,
    };

    let mut line = template.replace("{interface}", &ctx.interface);
    if line.contains("{target}") {
        let t = target.as_deref().ok_or_else(|| {
            BindError::Invalid("template uses {target} but the task has no target".to_string())
        })?;
        line = line.replace("{target}", t);
    }

    let mut argv = shlex::split(&line)
        .ok_or_else(|| BindError::Invalid(format!("unbalanced quotes in `{line}`")))?;
    if argv.is_empty() {
        return Err(BindError::Invalid("empty command".to_string()));
    }
    let program = argv.remove(0);

    Ok(BoundCommand {
        program,
        args: argv,
        target,
        line,
    })
}
