use is_terminal::IsTerminal;

/// Check if stderr is connected to a TTY
pub fn is_stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Determine if emoji prefixes should be used
pub fn should_use_emoji(no_emoji: bool) -> bool {
    if no_emoji {
        return false;
    }

    // NO_EMOJI works like NO_COLOR: any value disables
    if std::env::var_os("NO_EMOJI").is_some() {
        return false;
    }

    is_stderr_tty()
}
