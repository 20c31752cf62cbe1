//! End-to-end flows driven through the update function: spawn, deletion
//! with a running pane, graceful shutdown, and key routing.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use openkanban_config::Config;
use openkanban_core::{
    AgentStatus, Board, Project, ProjectId, ProjectRegistry, SessionId, Ticket, TicketStatus,
};
use openkanban_runtime::{Pane, PaneEvent, PaneEventSink};
use openkanban_ui::{update, Command, Event, Mode, Model};

fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn test_model(tickets: Vec<Ticket>) -> Model {
    let project = Project {
        id: ProjectId::new("proj-1"),
        name: "demo".to_owned(),
        repo_path: PathBuf::from("/work/demo"),
    };
    let mut board = Board::new();
    for ticket in tickets {
        board.add_ticket(ticket);
    }
    let mut model = Model::new(
        Arc::new(Config::default()),
        board,
        ProjectRegistry::new(vec![project]),
    );
    model.width = 120;
    model.height = 40;
    model
}

fn in_progress_ticket(title: &str) -> Ticket {
    let mut ticket = Ticket::new(ProjectId::new("proj-1"), title);
    ticket.status = TicketStatus::InProgress;
    ticket
}

fn select_in_progress(model: &mut Model) {
    model.active_column = 1;
    model.active_ticket = 0;
}

#[cfg(unix)]
fn recording_sink() -> (Arc<Mutex<Vec<PaneEvent>>>, PaneEventSink) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink: PaneEventSink = Arc::new(move |event| {
        sink_events.lock().expect("record event").push(event);
    });
    (events, sink)
}

#[test]
fn spawn_happy_path_reaches_agent_view() {
    let ticket = in_progress_ticket("hello");
    let id = ticket.id.clone();
    let short = id.short().to_owned();
    let mut model = test_model(vec![ticket]);
    select_in_progress(&mut model);

    // `s` enters Spawning and requests the worktree.
    let commands = update(&mut model, key(KeyCode::Char('s')));
    assert_eq!(model.mode, Mode::Spawning);
    let create = commands
        .iter()
        .find_map(|command| match command {
            Command::CreateWorktree { branch, repo_path, .. } => {
                Some((branch.clone(), repo_path.clone()))
            }
            _ => None,
        })
        .expect("worktree command");
    assert_eq!(create.0, format!("task/{short}"));
    assert_eq!(create.1, PathBuf::from("/work/demo"));

    // The worktree result persists branch metadata and starts the agent.
    let commands = update(
        &mut model,
        Event::WorktreeCreated {
            ticket: id.clone(),
            path: PathBuf::from(format!("/work/demo-worktrees/task-{short}")),
            branch: format!("task/{short}"),
            base_branch: "main".to_owned(),
        },
    );
    let started = commands
        .iter()
        .find_map(|command| match command {
            Command::StartAgent {
                session, workdir, ..
            } => Some((session.clone(), workdir.clone())),
            _ => None,
        })
        .expect("start command");
    assert_eq!(started.0.as_str(), format!("ok-{short}"));
    assert_eq!(
        started.1,
        PathBuf::from(format!("/work/demo-worktrees/task-{short}"))
    );
    let ticket = model.board.ticket(&id).expect("ticket");
    assert_eq!(ticket.branch_name, format!("task/{short}"));
    assert_eq!(ticket.base_branch, "main");
    assert!(ticket.has_worktree());

    // Pane start completion lands in AgentView with bookkeeping set.
    let pane = Pane::new(started.0.clone(), 80, 24, "/tmp");
    update(
        &mut model,
        Event::SpawnComplete {
            ticket: id.clone(),
            pane: Box::new(pane),
        },
    );
    assert_eq!(model.mode, Mode::AgentView);
    assert!(model.panes.contains_key(&id));
    let ticket = model.board.ticket(&id).expect("ticket");
    assert_eq!(ticket.session_id, Some(started.0));
    assert!(ticket.agent_spawned_at.is_some());
}

#[test]
fn spawn_requires_in_progress_status() {
    let mut ticket = in_progress_ticket("backlogged");
    ticket.status = TicketStatus::Backlog;
    let mut model = test_model(vec![ticket]);
    model.active_column = 0;

    let commands = update(&mut model, key(KeyCode::Char('s')));
    assert_eq!(model.mode, Mode::Normal);
    assert!(model.notification.as_deref().unwrap_or("").contains("In Progress"));
    assert!(!commands
        .iter()
        .any(|command| matches!(command, Command::CreateWorktree { .. })));
}

#[test]
fn escape_out_of_spawning_drops_the_late_worktree_result() {
    let ticket = in_progress_ticket("cancelled");
    let id = ticket.id.clone();
    let mut model = test_model(vec![ticket]);
    select_in_progress(&mut model);

    update(&mut model, key(KeyCode::Char('s')));
    assert_eq!(model.mode, Mode::Spawning);
    update(&mut model, key(KeyCode::Esc));
    assert_eq!(model.mode, Mode::Normal);

    // The command completed anyway; its result must be dropped.
    let commands = update(
        &mut model,
        Event::WorktreeCreated {
            ticket: id.clone(),
            path: PathBuf::from("/work/demo-worktrees/task-x"),
            branch: "task/x".to_owned(),
            base_branch: "main".to_owned(),
        },
    );
    assert!(commands.is_empty());
    assert!(!model.board.ticket(&id).expect("ticket").has_worktree());
}

#[test]
fn spawn_failure_returns_to_normal_with_notification() {
    let ticket = in_progress_ticket("doomed");
    let id = ticket.id.clone();
    let mut model = test_model(vec![ticket]);
    select_in_progress(&mut model);

    update(&mut model, key(KeyCode::Char('s')));
    update(
        &mut model,
        Event::SpawnFailed {
            ticket: id,
            error: "agent binary missing".to_owned(),
        },
    );
    assert_eq!(model.mode, Mode::Normal);
    assert!(model
        .notification
        .as_deref()
        .unwrap_or("")
        .contains("agent binary missing"));
}

#[test]
fn deletion_removes_ticket_and_pane_in_the_same_update_step() {
    let mut ticket = in_progress_ticket("victim");
    let id = ticket.id.clone();
    let session = SessionId::new(format!("ok-{}", id.short()));
    ticket.session_id = Some(session.clone());
    let mut model = test_model(vec![ticket]);
    select_in_progress(&mut model);
    model
        .panes
        .insert(id.clone(), Pane::new(session, 80, 24, "/tmp"));

    update(&mut model, key(KeyCode::Char('d')));
    assert_eq!(model.mode, Mode::Confirm);

    let commands = update(&mut model, key(KeyCode::Char('y')));
    // Invariant: ticket record and pane entry vanish together.
    assert!(model.board.ticket(&id).is_none());
    assert!(!model.panes.contains_key(&id));
    assert!(commands
        .iter()
        .any(|command| matches!(command, Command::ClosePane { .. })));
    assert!(commands
        .iter()
        .any(|command| matches!(command, Command::SaveTickets { .. })));

    // Running the close command is safe for an unstarted pane.
    for command in commands {
        if let Command::ClosePane { mut pane, .. } = command {
            pane.close();
        }
    }
}

#[test]
fn stop_clears_session_and_schedules_close() {
    let mut ticket = in_progress_ticket("stoppable");
    let id = ticket.id.clone();
    let session = SessionId::new(format!("ok-{}", id.short()));
    ticket.session_id = Some(session.clone());
    let mut model = test_model(vec![ticket]);
    select_in_progress(&mut model);
    model
        .panes
        .insert(id.clone(), Pane::new(session.clone(), 80, 24, "/tmp"));

    let commands = update(&mut model, key(KeyCode::Char('S')));
    assert!(!model.panes.contains_key(&id));
    let ticket = model.board.ticket(&id).expect("ticket survives stop");
    assert_eq!(ticket.session_id, None);
    assert_eq!(ticket.agent_status, AgentStatus::None);
    assert!(commands.iter().any(|command| matches!(
        command,
        Command::ClosePane {
            final_status: Some(AgentStatus::None),
            ..
        }
    )));
}

#[cfg(unix)]
#[test]
fn graceful_shutdown_waits_for_both_pane_exits() {
    let mut first = in_progress_ticket("one");
    let mut second = in_progress_ticket("two");
    let first_id = first.id.clone();
    let second_id = second.id.clone();
    let first_session = SessionId::new("ok-shutdown-1");
    let second_session = SessionId::new("ok-shutdown-2");
    first.session_id = Some(first_session.clone());
    second.session_id = Some(second_session.clone());
    let mut model = test_model(vec![first, second]);

    let (events, sink) = recording_sink();
    let workdir = std::env::current_dir().expect("current dir");
    let mut pane_one = Pane::new(first_session, 80, 24, &workdir);
    pane_one
        .start(
            "sh",
            &["-c".to_owned(), "sleep 30".to_owned()],
            &[],
            Arc::clone(&sink),
        )
        .expect("start first pane");
    let mut pane_two = Pane::new(second_session, 80, 24, &workdir);
    pane_two
        .start("sh", &["-c".to_owned(), "sleep 30".to_owned()], &[], sink)
        .expect("start second pane");
    model.panes.insert(first_id, pane_one);
    model.panes.insert(second_id, pane_two);

    // `q` closes every pane concurrently and waits in ShuttingDown.
    let commands = update(&mut model, key(KeyCode::Char('q')));
    assert_eq!(model.mode, Mode::ShuttingDown);
    assert!(!model.should_quit);
    assert_eq!(model.pending_closes.len(), 2);
    assert!(model.panes.is_empty());

    let close_commands: Vec<Command> = commands
        .into_iter()
        .filter(|command| matches!(command, Command::ClosePane { .. }))
        .collect();
    assert_eq!(close_commands.len(), 2);
    for command in close_commands {
        if let Command::ClosePane { mut pane, .. } = command {
            pane.close();
        }
    }

    // The read loops observed EOF and posted exit events.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let exits: Vec<PaneEvent> = events
            .lock()
            .expect("read events")
            .iter()
            .filter(|event| matches!(event, PaneEvent::Exit { .. }))
            .cloned()
            .collect();
        if exits.len() == 2 {
            for exit in exits {
                update(&mut model, Event::Pane(exit));
            }
            break;
        }
        assert!(Instant::now() < deadline, "panes never exited");
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(model.pending_closes.is_empty());
    assert!(model.should_quit);
}

#[test]
fn quit_without_running_panes_exits_immediately() {
    let mut model = test_model(vec![in_progress_ticket("calm")]);
    update(&mut model, key(KeyCode::Char('q')));
    assert!(model.should_quit);
}

#[test]
fn unexpected_pane_exit_clears_session_and_keeps_worktree() {
    let mut ticket = in_progress_ticket("crashed");
    ticket.worktree_path = "/work/demo-worktrees/task-x".to_owned();
    let id = ticket.id.clone();
    let session = SessionId::new("ok-crash");
    ticket.session_id = Some(session.clone());
    let mut model = test_model(vec![ticket]);
    model
        .panes
        .insert(id.clone(), Pane::new(session.clone(), 80, 24, "/tmp"));

    update(
        &mut model,
        Event::Pane(PaneEvent::Exit {
            session,
            error: None,
        }),
    );
    assert!(!model.panes.contains_key(&id));
    let ticket = model.board.ticket(&id).expect("ticket remains");
    assert_eq!(ticket.session_id, None);
    assert_eq!(ticket.agent_status, AgentStatus::None);
    assert!(ticket.has_worktree());
}

#[test]
fn classified_statuses_apply_and_write_side_channel() {
    let mut ticket = in_progress_ticket("classified");
    let id = ticket.id.clone();
    let session = SessionId::new("ok-status");
    ticket.session_id = Some(session.clone());
    let mut model = test_model(vec![ticket]);
    model
        .panes
        .insert(id.clone(), Pane::new(session.clone(), 80, 24, "/tmp"));

    let commands = update(
        &mut model,
        Event::StatusesClassified(vec![(id.clone(), AgentStatus::Working)]),
    );
    assert_eq!(
        model.board.ticket(&id).expect("ticket").agent_status,
        AgentStatus::Working
    );
    assert!(commands.iter().any(|command| matches!(
        command,
        Command::WriteStatusFile {
            status: AgentStatus::Working,
            ..
        }
    )));

    // A stale classification for a vanished pane is ignored.
    model.panes.remove(&id);
    let commands = update(
        &mut model,
        Event::StatusesClassified(vec![(id.clone(), AgentStatus::Idle)]),
    );
    assert!(commands.is_empty());
    assert_eq!(
        model.board.ticket(&id).expect("ticket").agent_status,
        AgentStatus::Working
    );
}

#[test]
fn space_moves_ticket_forward_and_done_is_terminal() {
    let ticket = Ticket::new(ProjectId::new("proj-1"), "mover");
    let id = ticket.id.clone();
    let mut model = test_model(vec![ticket]);
    model.active_column = 0;

    let commands = update(&mut model, key(KeyCode::Char(' ')));
    assert_eq!(
        model.board.ticket(&id).expect("ticket").status,
        TicketStatus::InProgress
    );
    assert!(commands
        .iter()
        .any(|command| matches!(command, Command::SaveTickets { .. })));

    model.active_column = 1;
    update(&mut model, key(KeyCode::Char(' ')));
    assert_eq!(
        model.board.ticket(&id).expect("ticket").status,
        TicketStatus::Done
    );

    model.active_column = 2;
    let commands = update(&mut model, key(KeyCode::Char(' ')));
    assert_eq!(
        model.board.ticket(&id).expect("ticket").status,
        TicketStatus::Done
    );
    assert!(commands.is_empty());
}

#[test]
fn q_in_filter_mode_is_typed_not_quit() {
    let mut model = test_model(vec![]);
    update(&mut model, key(KeyCode::Char('/')));
    assert_eq!(model.mode, Mode::Filter);
    update(&mut model, key(KeyCode::Char('q')));
    assert!(!model.should_quit);
    assert_eq!(model.filter.input, "q");

    update(&mut model, key(KeyCode::Esc));
    assert_eq!(model.mode, Mode::Normal);
    assert!(!model.filter.is_active());
}

#[test]
fn edit_form_refuses_blocked_by_cycle() {
    let mut blocker = Ticket::new(ProjectId::new("proj-1"), "first");
    let second = Ticket::new(ProjectId::new("proj-1"), "second");
    blocker.blocked_by.insert(second.id.clone());
    let blocker_id = blocker.id.clone();
    let mut model = test_model(vec![blocker, second]);
    model.active_column = 0;

    // Select "second" (whichever sorts second doesn't matter; find it).
    let tickets = model.visible_tickets(TicketStatus::Backlog);
    let second_index = tickets
        .iter()
        .position(|ticket| ticket.title == "second")
        .expect("second ticket visible");
    model.active_ticket = second_index;

    update(&mut model, key(KeyCode::Char('e')));
    assert_eq!(model.mode, Mode::EditTicket);
    {
        let form = model.form.as_mut().expect("edit form");
        form.blocked_by = blocker_id.short().to_owned();
    }
    update(&mut model, key(KeyCode::Enter));

    // The edit is rejected and the form stays open.
    assert_eq!(model.mode, Mode::EditTicket);
    assert!(model
        .notification
        .as_deref()
        .unwrap_or("")
        .contains("cycle"));
}

#[test]
fn help_overlay_consumes_the_next_key() {
    let mut model = test_model(vec![in_progress_ticket("safe")]);
    update(&mut model, key(KeyCode::Char('?')));
    assert_eq!(model.mode, Mode::Help);

    // `d` would normally open the delete confirmation.
    update(&mut model, key(KeyCode::Char('d')));
    assert_eq!(model.mode, Mode::Normal);
    assert!(model.confirm.is_none());
}
