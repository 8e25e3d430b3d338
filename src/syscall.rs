//! Canonical Linux syscall names, used to validate observed syscall
//! telemetry before it is written into a seccomp profile.

use std::collections::HashSet;

use lazy_static::lazy_static;

// Based on the kernel syscall tables for x86_64, ARM and friends.
static SYSCALL_NAMES: &[&str] = &[
    // process
    "fork", "vfork", "clone", "clone3", "execve", "execveat", "exit", "exit_group", "wait4",
    "waitid", "getpid", "gettid", "getppid", "getpgid", "setpgid", "getpgrp", "setsid", "getsid",
    "getuid", "setuid", "getgid", "setgid", "geteuid", "getegid", "setreuid", "setregid",
    "getresuid", "getresgid", "setresuid", "setresgid", "getgroups", "setgroups", "capget",
    "capset", "prctl", "arch_prctl", "setns", "unshare", "pidfd_open", "pidfd_send_signal",
    "pidfd_getfd",
    // memory
    "brk", "mmap", "mmap2", "munmap", "mremap", "mprotect", "madvise", "mlock", "mlock2",
    "munlock", "mlockall", "munlockall", "mincore", "msync", "remap_file_pages", "memfd_create",
    "memfd_secret", "mempolicy", "mbind", "get_mempolicy", "set_mempolicy", "migrate_pages",
    "move_pages", "pkey_alloc", "pkey_free", "pkey_mprotect",
    // files
    "read", "write", "open", "openat", "openat2", "close", "close_range", "creat", "link",
    "linkat", "unlink", "unlinkat", "symlink", "symlinkat", "readlink", "readlinkat", "chmod",
    "fchmod", "fchmodat", "chown", "fchown", "lchown", "fchownat", "umask", "access", "faccessat",
    "faccessat2", "stat", "fstat", "lstat", "fstatat", "statx", "readv", "writev", "pread",
    "pread64", "pwrite", "pwrite64", "preadv", "preadv2", "pwritev", "pwritev2", "lseek", "dup",
    "dup2", "dup3", "fcntl", "ioctl", "flock", "fsync", "fdatasync", "sync", "sync_file_range",
    "syncfs", "truncate", "ftruncate", "fallocate", "fadvise64", "sendfile", "sendfile64",
    "splice", "tee", "vmsplice", "copy_file_range", "name_to_handle_at", "open_by_handle_at",
    // directories
    "getcwd", "chdir", "fchdir", "chroot", "mkdir", "mkdirat", "rmdir", "rename", "renameat",
    "renameat2", "getdents", "getdents64", "lookup_dcookie",
    // filesystems
    "mount", "umount", "umount2", "pivot_root", "statfs", "fstatfs", "ustat", "quotactl",
    "fsopen", "fsconfig", "fsmount", "fspick", "move_mount", "open_tree",
    // io multiplexing
    "select", "pselect6", "poll", "ppoll", "epoll_create", "epoll_create1", "epoll_ctl",
    "epoll_wait", "epoll_pwait", "epoll_pwait2",
    // sockets
    "socket", "socketpair", "bind", "listen", "accept", "accept4", "connect", "getsockname",
    "getpeername", "send", "sendto", "sendmsg", "sendmmsg", "recv", "recvfrom", "recvmsg",
    "recvmmsg", "shutdown", "setsockopt", "getsockopt", "socketcall",
    // signals
    "kill", "tkill", "tgkill", "signal", "sigaction", "rt_sigaction", "sigprocmask",
    "rt_sigprocmask", "sigpending", "rt_sigpending", "sigsuspend", "rt_sigsuspend", "sigaltstack",
    "rt_sigtimedwait", "rt_sigqueueinfo", "rt_tgsigqueueinfo", "rt_sigreturn", "restart_syscall",
    "pause", "signalfd", "signalfd4",
    // time
    "time", "gettimeofday", "settimeofday", "clock_gettime", "clock_settime", "clock_getres",
    "clock_nanosleep", "clock_adjtime", "adjtimex", "times", "nanosleep", "alarm", "setitimer",
    "getitimer", "timer_create", "timer_settime", "timer_gettime", "timer_getoverrun",
    "timer_delete", "timerfd_create", "timerfd_settime", "timerfd_gettime",
    // scheduling
    "sched_setparam", "sched_getparam", "sched_setscheduler", "sched_getscheduler",
    "sched_get_priority_max", "sched_get_priority_min", "sched_rr_get_interval", "sched_yield",
    "sched_setaffinity", "sched_getaffinity", "sched_setattr", "sched_getattr",
    // system info
    "uname", "sysinfo", "syslog", "klogctl", "personality", "getrlimit", "setrlimit", "prlimit64",
    "getrusage", "sysfs", "sethostname", "setdomainname", "gethostname", "getdomainname",
    // fs uid/gid
    "setfsuid", "setfsgid",
    // xattrs
    "setxattr", "lsetxattr", "fsetxattr", "getxattr", "lgetxattr", "fgetxattr", "listxattr",
    "llistxattr", "flistxattr", "removexattr", "lremovexattr", "fremovexattr",
    // aio / io_uring
    "io_setup", "io_destroy", "io_submit", "io_cancel", "io_getevents", "io_pgetevents",
    "io_uring_setup", "io_uring_enter", "io_uring_register",
    // futex
    "futex", "futex_waitv", "set_robust_list", "get_robust_list",
    // ipc
    "mq_open", "mq_unlink", "mq_timedsend", "mq_timedreceive", "mq_notify", "mq_getsetattr",
    "semget", "semop", "semctl", "semtimedop", "shmget", "shmat", "shmdt", "shmctl", "msgget",
    "msgsnd", "msgrcv", "msgctl", "ipc",
    // pipes
    "pipe", "pipe2",
    // fs notification
    "inotify_init", "inotify_init1", "inotify_add_watch", "inotify_rm_watch", "fanotify_init",
    "fanotify_mark",
    // keys
    "add_key", "request_key", "keyctl",
    // modules
    "init_module", "finit_module", "delete_module",
    // bpf / perf
    "bpf", "perf_event_open",
    // landlock
    "landlock_create_ruleset", "landlock_add_rule", "landlock_restrict_self",
    // numa
    "set_mempolicy_home_node",
    // process vm
    "process_vm_readv", "process_vm_writev",
    // misc
    "getrandom", "reboot", "getpriority", "setpriority", "ioprio_set", "ioprio_get", "ptrace",
    "acct", "seccomp", "utrace", "vhangup", "uselib", "kcmp", "swapon", "swapoff", "readahead",
    // x86
    "modify_ldt", "ioperm", "iopl", "vm86", "vm86old",
    // arm
    "breakpoint", "cacheflush", "set_tls", "usr26", "usr32",
    // obsolete but still observed in the wild
    "oldolduname", "olduname", "oldstat", "oldlstat", "oldfstat", "_sysctl", "create_module",
    "query_module", "get_kernel_syms", "afs_syscall", "nfsservctl", "getpmsg", "putpmsg",
    "vserver", "idle", "sysctl", "bdflush",
    // 5.x+
    "process_madvise", "process_mrelease", "mount_setattr", "quotactl_fd",
];

lazy_static! {
    static ref VALID_SYSCALLS: HashSet<&'static str> = SYSCALL_NAMES.iter().copied().collect();
}

pub fn is_valid_syscall(name: &str) -> bool {
    VALID_SYSCALLS.contains(name.trim().to_lowercase().as_str())
}

/// Completion candidates for a partial syscall name: prefix matches first,
/// then substring matches, each group sorted, capped at `limit`.
pub fn syscall_suggestions(partial: &str, limit: usize) -> Vec<&'static str> {
    if partial.is_empty() || limit == 0 {
        return Vec::new();
    }
    let partial = partial.to_lowercase();

    let mut prefixed: Vec<&'static str> = VALID_SYSCALLS
        .iter()
        .copied()
        .filter(|s| s.starts_with(&partial))
        .collect();
    prefixed.sort_unstable();

    let mut contained: Vec<&'static str> = VALID_SYSCALLS
        .iter()
        .copied()
        .filter(|s| s.contains(&partial) && !s.starts_with(&partial))
        .collect();
    contained.sort_unstable();

    prefixed.extend(contained);
    prefixed.truncate(limit);
    prefixed
}

/// Split a comma-separated syscall list, trim each entry and validate it.
/// Valid names come back lower-cased; unrecognized names are reported
/// separately rather than dropped.
pub fn parse_syscall_list(raw: &str) -> (Vec<String>, Vec<String>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if is_valid_syscall(name) {
            valid.push(name.to_lowercase());
        } else {
            invalid.push(name.to_string());
        }
    }

    (valid, invalid)
}
