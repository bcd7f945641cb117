mod queue_journal_tests;
mod recovery_tests;
mod scenario_tests;
