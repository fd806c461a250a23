fn main() -> std::process::ExitCode {
    mood_journal_lib::run()
}
