mod common;

mod cli {
    mod branch_and_merge;
    mod commit_and_log;
    mod init;
    mod patches;
    mod show_and_config;
    mod status;
}

mod library {
    mod on_disk_repository;
    mod transactions;
}
