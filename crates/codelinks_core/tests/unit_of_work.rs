use codelinks_core::context::{Clock, ManualClock};
use codelinks_core::db::{
    ConnectionProvider, DbConnection, DbError, DbResult, DbTransaction, TransactionState,
};
use codelinks_core::uow::{
    FactoryError, FactoryResult, IntoContract, RepositoryFactory, ServiceContainer,
    ServiceResolver, TransactionBinding, TransactionalRepository, UnitOfWork, UnitOfWorkError,
    UnitOfWorkFactory,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type EventLog = Rc<RefCell<Vec<&'static str>>>;

fn count(log: &EventLog, event: &str) -> usize {
    log.borrow().iter().filter(|entry| **entry == event).count()
}

struct StubTransaction {
    log: EventLog,
    state: Cell<TransactionState>,
    fail_finish: bool,
}

impl DbTransaction for StubTransaction {
    fn state(&self) -> TransactionState {
        self.state.get()
    }

    fn commit(&self) -> DbResult<()> {
        self.ensure_active()?;
        self.log.borrow_mut().push("commit");
        if self.fail_finish {
            return Err(DbError::Driver("commit refused".to_string()));
        }
        self.state.set(TransactionState::Committed);
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        self.ensure_active()?;
        self.log.borrow_mut().push("rollback");
        if self.fail_finish {
            return Err(DbError::Driver("rollback refused".to_string()));
        }
        self.state.set(TransactionState::RolledBack);
        Ok(())
    }

    fn dispose(&self) {
        self.log.borrow_mut().push("dispose");
        self.state.set(TransactionState::Disposed);
    }
}

#[derive(Default)]
struct Failures {
    finish: bool,
    begin: bool,
    close: bool,
}

struct StubConnection {
    log: EventLog,
    open: Cell<bool>,
    fail: Failures,
}

impl StubConnection {
    fn with_failures(log: &EventLog, fail: Failures) -> Rc<Self> {
        Rc::new(Self {
            log: Rc::clone(log),
            open: Cell::new(false),
            fail,
        })
    }

    fn closed(log: &EventLog) -> Rc<Self> {
        Self::with_failures(log, Failures::default())
    }

    fn already_open(log: &EventLog) -> Rc<Self> {
        let connection = Self::closed(log);
        connection.open.set(true);
        connection
    }

    fn failing(log: &EventLog) -> Rc<Self> {
        Self::with_failures(
            log,
            Failures {
                finish: true,
                ..Failures::default()
            },
        )
    }
}

impl DbConnection for StubConnection {
    type Transaction = StubTransaction;

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn open(&self) -> DbResult<()> {
        self.log.borrow_mut().push("open");
        self.open.set(true);
        Ok(())
    }

    fn begin_transaction(&self) -> DbResult<StubTransaction> {
        if !self.is_open() {
            return Err(DbError::ConnectionClosed);
        }
        self.log.borrow_mut().push("begin");
        if self.fail.begin {
            return Err(DbError::Driver("busy".to_string()));
        }
        Ok(StubTransaction {
            log: Rc::clone(&self.log),
            state: Cell::new(TransactionState::Active),
            fail_finish: self.fail.finish,
        })
    }

    fn close(&self) -> DbResult<()> {
        self.log.borrow_mut().push("close");
        self.open.set(false);
        if self.fail.close {
            return Err(DbError::Driver("close refused".to_string()));
        }
        Ok(())
    }
}

struct StubProvider {
    log: EventLog,
}

impl ConnectionProvider for StubProvider {
    type Connection = StubConnection;

    fn connection(&self) -> DbResult<Rc<StubConnection>> {
        Ok(StubConnection::closed(&self.log))
    }
}

/// Counts repository constructions performed by the factory.
#[derive(Default)]
struct Constructions(Cell<usize>);

struct Widget;
struct Gadget;

trait WidgetStore {
    fn binding(&self) -> &TransactionBinding<StubConnection>;

    fn touch(&self) -> DbResult<()> {
        self.binding().ensure_active()
    }
}

struct StubWidgetStore {
    binding: TransactionBinding<StubConnection>,
}

impl TransactionalRepository<StubConnection> for StubWidgetStore {
    fn construct(
        binding: TransactionBinding<StubConnection>,
        services: &ServiceResolver<'_>,
    ) -> FactoryResult<Self> {
        let constructions = services.resolve::<Constructions>()?;
        constructions.0.set(constructions.0.get() + 1);
        Ok(Self { binding })
    }
}

impl IntoContract<dyn WidgetStore> for StubWidgetStore {
    fn into_contract(self: Rc<Self>) -> Rc<dyn WidgetStore> {
        self
    }
}

impl WidgetStore for StubWidgetStore {
    fn binding(&self) -> &TransactionBinding<StubConnection> {
        &self.binding
    }
}

/// Needs a clock, which the default test container does not provide.
struct ClockedGadgetStore {
    _clock: Rc<dyn Clock>,
}

impl TransactionalRepository<StubConnection> for ClockedGadgetStore {
    fn construct(
        _binding: TransactionBinding<StubConnection>,
        services: &ServiceResolver<'_>,
    ) -> FactoryResult<Self> {
        Ok(Self {
            _clock: services.resolve::<dyn Clock>()?,
        })
    }
}

struct Fixture {
    log: EventLog,
    constructions: Rc<Constructions>,
    factory: RepositoryFactory<StubConnection>,
}

impl Fixture {
    fn new() -> Self {
        let constructions = Rc::new(Constructions::default());
        let mut services = ServiceContainer::new();
        services.register_shared(Rc::clone(&constructions));

        let mut factory = RepositoryFactory::new(services);
        factory
            .register::<Widget, StubWidgetStore>()
            .register::<Gadget, ClockedGadgetStore>();

        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            constructions,
            factory,
        }
    }

    fn unit_of_work(&self, connection: Rc<StubConnection>) -> UnitOfWork<StubConnection> {
        UnitOfWork::new(connection, self.factory.clone())
    }

    fn events(&self) -> Vec<&'static str> {
        self.log.borrow().clone()
    }

    fn constructions(&self) -> usize {
        self.constructions.0.get()
    }
}

fn widgets(uow: &mut UnitOfWork<StubConnection>) -> Rc<dyn WidgetStore> {
    uow.repository::<Widget, dyn WidgetStore, StubWidgetStore>()
        .unwrap()
}

#[test]
fn repeated_repository_requests_share_one_instance() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let first = widgets(&mut uow);
    let second = widgets(&mut uow);

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(fixture.constructions(), 1);
    assert_eq!(uow.cached_repositories(), 1);
}

#[test]
fn repository_request_begins_transaction_when_idle() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));
    assert!(!uow.is_active());

    let store = widgets(&mut uow);

    assert!(uow.is_active());
    assert_eq!(fixture.events(), vec!["open", "begin"]);
    store.touch().unwrap();
}

#[test]
fn repository_binding_carries_the_active_connection_and_transaction() {
    let fixture = Fixture::new();
    let connection = StubConnection::closed(&fixture.log);
    let mut uow = fixture.unit_of_work(Rc::clone(&connection));

    let store = widgets(&mut uow);

    assert!(std::ptr::eq(store.binding().connection(), &*connection));
    assert_eq!(store.binding().transaction().state(), TransactionState::Active);
}

#[test]
fn begin_transaction_is_idempotent() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.begin_transaction().unwrap();

    assert_eq!(count(&fixture.log, "begin"), 1);
    assert_eq!(count(&fixture.log, "open"), 1);
}

#[test]
fn begin_skips_open_for_an_already_open_connection() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::already_open(&fixture.log));

    uow.begin_transaction().unwrap();

    assert_eq!(fixture.events(), vec!["begin"]);
}

fn busy(log: &EventLog) -> Rc<StubConnection> {
    StubConnection::with_failures(
        log,
        Failures {
            begin: true,
            ..Failures::default()
        },
    )
}

#[test]
fn begin_failure_closes_connection() {
    let fixture = Fixture::new();
    let connection = busy(&fixture.log);
    let mut uow = fixture.unit_of_work(Rc::clone(&connection));

    let err = uow.begin_transaction().unwrap_err();

    match err {
        UnitOfWorkError::Db(DbError::Driver(message)) => assert_eq!(message, "busy"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fixture.events(), vec!["open", "begin", "close"]);
    assert!(!connection.is_open());
    assert!(!uow.is_active());

    drop(uow);
    assert_eq!(count(&fixture.log, "close"), 1);
}

#[test]
fn begin_failure_leaves_a_caller_opened_connection_open() {
    let fixture = Fixture::new();
    let connection = busy(&fixture.log);
    connection.open.set(true);
    let mut uow = fixture.unit_of_work(Rc::clone(&connection));

    assert!(uow
        .repository::<Widget, dyn WidgetStore, StubWidgetStore>()
        .is_err());

    assert_eq!(fixture.events(), vec!["begin"]);
    assert!(connection.is_open());
    assert_eq!(fixture.constructions(), 0);
}

#[test]
fn commit_on_open_connection_without_transaction_only_closes() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::already_open(&fixture.log));

    uow.commit_changes().unwrap();

    assert_eq!(count(&fixture.log, "close"), 1);
    assert_eq!(count(&fixture.log, "commit"), 0);
}

#[test]
fn rollback_on_open_connection_without_transaction_only_closes() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::already_open(&fixture.log));

    uow.rollback_changes().unwrap();

    assert_eq!(fixture.events(), vec!["close"]);
}

#[test]
fn commit_happens_before_close() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.commit_changes().unwrap();

    assert_eq!(fixture.events(), vec!["open", "begin", "commit", "close"]);
    assert!(!uow.is_active());
}

#[test]
fn rollback_happens_before_close() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.rollback_changes().unwrap();

    assert_eq!(fixture.events(), vec!["open", "begin", "rollback", "close"]);
}

#[test]
fn dispose_without_finish_disposes_transaction_and_closes() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.dispose();

    assert_eq!(count(&fixture.log, "dispose"), 1);
    assert_eq!(count(&fixture.log, "close"), 1);
    assert!(!uow.is_active());
}

#[test]
fn dispose_is_idempotent_and_drop_adds_no_calls() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.dispose();
    uow.dispose();
    drop(uow);

    assert_eq!(count(&fixture.log, "dispose"), 1);
    assert_eq!(count(&fixture.log, "close"), 1);
}

#[test]
fn dispose_before_any_begin_is_safe() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.dispose();

    assert!(fixture.events().is_empty());
}

#[test]
fn dispose_closes_an_open_connection_without_transaction() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::already_open(&fixture.log));

    uow.dispose();

    assert_eq!(fixture.events(), vec!["close"]);
}

#[test]
fn dropping_an_active_unit_of_work_releases_everything() {
    let fixture = Fixture::new();
    {
        let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));
        widgets(&mut uow);
    }

    assert_eq!(fixture.events(), vec!["open", "begin", "dispose", "close"]);
}

fn unclosable(log: &EventLog) -> Rc<StubConnection> {
    StubConnection::with_failures(
        log,
        Failures {
            close: true,
            ..Failures::default()
        },
    )
}

#[test]
fn dispose_and_drop_tolerate_a_failing_close() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(unclosable(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.dispose();
    assert!(!uow.is_active());
    drop(uow);

    assert_eq!(fixture.events(), vec!["open", "begin", "dispose", "close"]);
}

#[test]
fn dropping_with_a_failing_close_still_disposes_the_transaction() {
    let fixture = Fixture::new();
    {
        let mut uow = fixture.unit_of_work(unclosable(&fixture.log));
        widgets(&mut uow);
    }

    assert_eq!(fixture.events(), vec!["open", "begin", "dispose", "close"]);
}

#[test]
fn commit_surfaces_a_failing_close_after_committing() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(unclosable(&fixture.log));

    uow.begin_transaction().unwrap();
    let err = uow.commit_changes().unwrap_err();

    assert!(matches!(err, UnitOfWorkError::Db(DbError::Driver(_))));
    assert_eq!(fixture.events(), vec!["open", "begin", "commit", "close"]);
    assert!(!uow.is_active());
}

#[test]
fn commit_clears_cache_and_next_request_constructs_again() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let before = widgets(&mut uow);
    uow.commit_changes().unwrap();
    assert_eq!(uow.cached_repositories(), 0);

    let after = widgets(&mut uow);

    assert_eq!(fixture.constructions(), 2);
    assert!(!Rc::ptr_eq(&before, &after));
    assert!(!std::ptr::eq(
        before.binding().transaction(),
        after.binding().transaction()
    ));
    assert_eq!(count(&fixture.log, "begin"), 2);
}

#[test]
fn rollback_clears_cache_and_next_request_constructs_again() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    widgets(&mut uow);
    uow.rollback_changes().unwrap();
    widgets(&mut uow);

    assert_eq!(fixture.constructions(), 2);
}

#[test]
fn stale_repository_fails_fast_after_commit() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let stale = widgets(&mut uow);
    uow.commit_changes().unwrap();

    let err = stale.touch().unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionFinished(TransactionState::Committed)
    ));
}

#[test]
fn stale_repository_fails_fast_after_dispose() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let stale = widgets(&mut uow);
    uow.dispose();

    assert!(matches!(
        stale.touch(),
        Err(DbError::TransactionFinished(TransactionState::Disposed))
    ));
}

#[test]
fn failed_commit_propagates_and_still_closes() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::failing(&fixture.log));

    uow.begin_transaction().unwrap();
    let err = uow.commit_changes().unwrap_err();

    match err {
        UnitOfWorkError::Db(DbError::Driver(message)) => assert_eq!(message, "commit refused"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        fixture.events(),
        vec!["open", "begin", "commit", "dispose", "close"]
    );
    assert!(!uow.is_active());

    drop(uow);
    assert_eq!(count(&fixture.log, "close"), 1);
}

#[test]
fn failed_rollback_propagates_and_still_closes() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::failing(&fixture.log));

    uow.begin_transaction().unwrap();
    assert!(uow.rollback_changes().is_err());

    assert_eq!(count(&fixture.log, "close"), 1);
    assert_eq!(count(&fixture.log, "dispose"), 1);
}

#[test]
fn unit_of_work_is_reusable_after_commit() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    uow.begin_transaction().unwrap();
    uow.commit_changes().unwrap();
    uow.begin_transaction().unwrap();
    uow.rollback_changes().unwrap();

    assert_eq!(
        fixture.events(),
        vec!["open", "begin", "commit", "close", "open", "begin", "rollback", "close"]
    );
}

#[test]
fn missing_dependency_is_reported_on_first_request() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let err = uow
        .repository::<Gadget, ClockedGadgetStore, ClockedGadgetStore>()
        .err()
        .unwrap();

    match err {
        UnitOfWorkError::Factory(FactoryError::Unresolved { service, .. }) => {
            assert!(service.contains("Clock"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(uow.cached_repositories(), 0);
}

#[test]
fn registered_service_satisfies_the_dependency() {
    let fixture = Fixture::new();
    let mut services = ServiceContainer::new();
    services
        .register_shared(Rc::clone(&fixture.constructions))
        .register_shared::<dyn Clock>(Rc::new(ManualClock::new(0, 1)));
    let mut factory = RepositoryFactory::new(services);
    factory.register::<Gadget, ClockedGadgetStore>();
    let mut uow = UnitOfWork::new(StubConnection::closed(&fixture.log), factory);

    assert!(uow
        .repository::<Gadget, ClockedGadgetStore, ClockedGadgetStore>()
        .is_ok());
}

#[test]
fn unregistered_pair_is_a_configuration_error() {
    let fixture = Fixture::new();
    let mut uow = fixture.unit_of_work(StubConnection::closed(&fixture.log));

    let err = uow
        .repository::<Gadget, dyn WidgetStore, StubWidgetStore>()
        .err()
        .unwrap();

    assert!(matches!(
        err,
        UnitOfWorkError::Factory(FactoryError::NotRegistered { .. })
    ));
}

#[test]
fn factory_passes_connection_and_transaction_through() {
    let fixture = Fixture::new();
    let connection = StubConnection::already_open(&fixture.log);
    let transaction = Rc::new(connection.begin_transaction().unwrap());

    let store = fixture
        .factory
        .create_repository::<Widget, StubWidgetStore>(
            Rc::clone(&connection),
            Rc::clone(&transaction),
        )
        .unwrap();

    assert!(std::ptr::eq(store.binding.connection(), &*connection));
    assert!(std::ptr::eq(store.binding.transaction(), &*transaction));
}

#[test]
fn factory_hands_out_idle_units_over_fresh_connections() {
    let fixture = Fixture::new();
    let units = UnitOfWorkFactory::new(
        StubProvider {
            log: Rc::clone(&fixture.log),
        },
        fixture.factory.clone(),
    );

    let mut first = units.unit_of_work().unwrap();
    let second = units.unit_of_work().unwrap();
    assert!(!first.is_active());
    assert!(!Rc::ptr_eq(first.connection(), second.connection()));

    first.begin_transaction().unwrap();
    first.commit_changes().unwrap();
    drop(second);

    assert_eq!(fixture.events(), vec!["open", "begin", "commit", "close"]);
}
