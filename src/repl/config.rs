use std::time::Duration;

/// Stack size of the thread a session runs on. Deeply nested scripts
/// recurse in the parser and the evaluator.
pub const SHELL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Settings of a shell session.
#[derive(Debug, Clone)]
pub struct ReplOptions {
    /// Wall-clock limit for one command, timers and promises included.
    pub timeout: Duration,
    /// Limit for evaluating a member path during completion.
    pub completion_timeout: Duration,
    pub input_prompt: String,
    pub continuation_prompt: String,
    pub output_prompt: String,
    /// Skip the banner and prompts.
    pub quiet: bool,
    /// Install the standard global objects.
    pub builtins: bool,
}

impl Default for ReplOptions {
    fn default() -> Self {
        ReplOptions {
            timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_millis(200),
            input_prompt: "In [{}]: ".to_string(),
            continuation_prompt: "...: ".to_string(),
            output_prompt: "Out[{}]: ".to_string(),
            quiet: false,
            builtins: true,
        }
    }
}

impl ReplOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_builtins(mut self, builtins: bool) -> Self {
        self.builtins = builtins;
        self
    }

    /// The input prompt for command `n`. `{}` in the template is the number.
    pub fn input_prompt_for(&self, n: usize) -> String {
        self.input_prompt.replace("{}", &n.to_string())
    }

    pub fn output_prompt_for(&self, n: usize) -> String {
        self.output_prompt.replace("{}", &n.to_string())
    }

    /// The continuation prompt, right-aligned under the input prompt.
    pub fn continuation_prompt_for(&self, n: usize) -> String {
        let width = self.input_prompt_for(n).chars().count();
        format!("{:>width$}", self.continuation_prompt, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_the_sequence_number() {
        let options = ReplOptions::default();
        assert_eq!(options.input_prompt_for(3), "In [3]: ");
        assert_eq!(options.output_prompt_for(3), "Out[3]: ");
        assert_eq!(options.continuation_prompt_for(3), "   ...: ");
    }
}
