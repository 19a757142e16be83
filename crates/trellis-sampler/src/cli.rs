//! Command-line flag handling
//!
//! Subcommand-style flags with long and short forms. Unknown flags
//! are silently ignored; a flag that wants a value but does not get
//! one logs an error and parsing continues. `--help` and `--version`
//! are built in and exit the process.

/// One flag the program understands.
pub struct Command<'a> {
    pub long: &'static str,
    pub short: &'static str,
    pub description: &'static str,
    /// Whether the flag consumes the next argument.
    pub takes_value: bool,
    pub action: Box<dyn FnMut(Option<&str>) + 'a>,
}

impl<'a> Command<'a> {
    pub fn new(
        long: &'static str,
        short: &'static str,
        description: &'static str,
        action: impl FnMut(Option<&str>) + 'a,
    ) -> Self {
        Self {
            long,
            short,
            description,
            takes_value: false,
            action: Box::new(action),
        }
    }

    pub fn with_value(
        long: &'static str,
        short: &'static str,
        description: &'static str,
        action: impl FnMut(Option<&str>) + 'a,
    ) -> Self {
        Self {
            long,
            short,
            description,
            takes_value: true,
            action: Box::new(action),
        }
    }
}

/// Flag parser for the demo programs.
pub struct Cli<'a> {
    name: &'static str,
    about: &'static str,
    version: &'static str,
    commands: Vec<Command<'a>>,
}

impl<'a> Cli<'a> {
    pub fn new(
        name: &'static str,
        about: &'static str,
        version: &'static str,
        commands: Vec<Command<'a>>,
    ) -> Self {
        Self {
            name,
            about,
            version,
            commands,
        }
    }

    /// Walk the argument list, running the action of every matched
    /// flag.
    pub fn parse(&mut self, args: &[String]) {
        let mut index = 0;
        while index < args.len() {
            let arg = args[index].as_str();

            if arg == "--help" || arg == "-h" {
                self.print_help();
                std::process::exit(0);
            }
            if arg == "--version" || arg == "-v" {
                println!("{} {}", self.name, self.version);
                std::process::exit(0);
            }

            match self
                .commands
                .iter_mut()
                .find(|c| c.long == arg || c.short == arg)
            {
                Some(command) if command.takes_value => {
                    let value = args.get(index + 1).map(|s| s.as_str());
                    match value {
                        Some(value) => {
                            (command.action)(Some(value));
                            index += 1;
                        }
                        None => {
                            log::error!("{}: missing argument for {}", self.name, arg);
                            (command.action)(None);
                        }
                    }
                }
                Some(command) => (command.action)(None),
                None => {
                    // Unknown flags are ignored.
                    log::debug!("{}: ignoring unknown flag {}", self.name, arg);
                }
            }

            index += 1;
        }
    }

    fn print_help(&self) {
        println!("{} {} - {}", self.name, self.version, self.about);
        println!();
        println!("Options:");
        println!("  {:<24} {:<5} {}", "--help", "-h", "Show this help");
        println!("  {:<24} {:<5} {}", "--version", "-v", "Show the version");
        for command in &self.commands {
            let long = if command.takes_value {
                format!("{} <value>", command.long)
            } else {
                command.long.to_string()
            };
            println!("  {:<24} {:<5} {}", long, command.short, command.description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn long_and_short_forms_match() {
        let hits = RefCell::new(0);
        {
            let mut cli = Cli::new(
                "test",
                "",
                "0.0.0",
                vec![Command::new("--verbose", "-vb", "", |_| {
                    *hits.borrow_mut() += 1;
                })],
            );
            cli.parse(&args(&["--verbose", "-vb"]));
        }
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn value_flags_consume_the_next_argument() {
        let value = RefCell::new(None);
        {
            let mut cli = Cli::new(
                "test",
                "",
                "0.0.0",
                vec![Command::with_value("--set-midi-input", "-i", "", |v| {
                    *value.borrow_mut() = v.map(|s| s.to_string());
                })],
            );
            cli.parse(&args(&["-i", "3"]));
        }
        assert_eq!(value.borrow().as_deref(), Some("3"));
    }

    #[test]
    fn missing_value_still_invokes_the_action() {
        let calls = RefCell::new(Vec::new());
        {
            let mut cli = Cli::new(
                "test",
                "",
                "0.0.0",
                vec![Command::with_value("--set-audio-output", "-o", "", |v| {
                    calls.borrow_mut().push(v.map(|s| s.to_string()));
                })],
            );
            cli.parse(&args(&["--set-audio-output"]));
        }
        assert_eq!(calls.borrow().as_slice(), &[None]);
    }

    #[test]
    fn unknown_flags_are_silently_skipped() {
        let hits = RefCell::new(0);
        {
            let mut cli = Cli::new(
                "test",
                "",
                "0.0.0",
                vec![Command::new("--verbose", "-vb", "", |_| {
                    *hits.borrow_mut() += 1;
                })],
            );
            cli.parse(&args(&["--frobnicate", "--verbose", "stray"]));
        }
        assert_eq!(*hits.borrow(), 1);
    }
}
