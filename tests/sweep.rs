use std::{ rc::Rc, sync::Arc };
use approx::assert_abs_diff_eq;
use ndarray as nd;
use dmrg_wft::{
    *,
    stack::StackError,
};

fn site(k: usize) -> Basis { Basis::new([k], [0, 1]).unwrap() }

fn mat(rows: usize, cols: usize, val: f64) -> TransformMatrix<f64> {
    TransformMatrix::new(nd::Array2::from_elem((rows, cols), val))
}

fn eye(n: usize) -> TransformMatrix<f64> { TransformMatrix::new(nd::Array2::eye(n)) }

fn dummy_bases() -> (Arc<Basis>, Arc<Basis>) {
    let pair = Basis::product(&site(0), &site(1)).unwrap();
    let sup = Basis::product(&pair, &pair).unwrap();
    (Arc::new(pair), Arc::new(sup))
}

fn controller() -> WftController<f64> {
    WftController::new(WftConfig::default(), NullSink)
}

#[test]
fn trigger_on_takes_environ_and_keeps_system() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    let a = mat(4, 8, 1.0);
    let b = mat(4, 8, 2.0);
    wft.push(a.clone(), Direction::ExpandSystem, &pair, &pair, &sup).unwrap();
    wft.push(b.clone(), Direction::ExpandEnviron, &pair, &pair, &sup).unwrap();
    assert_eq!(wft.stack_depths(), (1, 1));

    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    wft.trigger_on(&pair, &pair, &sup).unwrap();
    assert!(wft.wave().we.as_ref().unwrap().ptr_eq(&b));
    assert!(wft.wave().ws.as_ref().unwrap().ptr_eq(&a));
    assert_eq!(wft.stack_depths(), (1, 0));
}

#[test]
fn finite_push_installs_both_sides() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    wft.push(mat(4, 4, 1.0), Direction::ExpandSystem, &pair, &pair, &sup).unwrap();
    wft.set_stage(Stage::ExpandEnviron, CounterPolicy::ResetCounter);
    for n in 1..=2 {
        let m = mat(4, 4, n as f64);
        wft.push(m.clone(), Direction::ExpandEnviron, &pair, &pair, &sup).unwrap();
        assert!(wft.wave().ws.as_ref().unwrap().ptr_eq(&m));
        assert!(wft.wave().we.as_ref().unwrap().ptr_eq(&m));
        assert_eq!(wft.stack_depths(), (1, n));
    }
}

#[test]
fn pops_never_exceed_pushes() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    wft.push(mat(4, 4, 1.0), Direction::ExpandSystem, &pair, &pair, &sup).unwrap();
    wft.push(mat(4, 4, 2.0), Direction::ExpandSystem, &pair, &pair, &sup).unwrap();
    wft.push(mat(4, 4, 3.0), Direction::ExpandEnviron, &pair, &pair, &sup).unwrap();

    wft.set_stage(Stage::ExpandEnviron, CounterPolicy::ResetCounter);
    wft.trigger_on(&pair, &pair, &sup).unwrap();
    assert_eq!(wft.stack_depths(), (1, 1));
    wft.trigger_off(&pair, &pair, &sup);
    wft.trigger_on(&pair, &pair, &sup).unwrap();
    assert_eq!(wft.stack_depths(), (0, 1));
    wft.trigger_off(&pair, &pair, &sup);
    assert_eq!(
        wft.trigger_on(&pair, &pair, &sup),
        Err(WftError::Stack(StackError::StackUnderflow(Side::System))),
    );
    assert_eq!(wft.stack_depths(), (0, 1));
}

#[test]
fn first_step_needs_history() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    assert_eq!(
        wft.trigger_on(&pair, &pair, &sup),
        Err(WftError::Stack(StackError::EmptyHistory(Side::Environ))),
    );
}

#[test]
fn growth_stage_always_gives_random_unit_vector() {
    let (pair, sup) = dummy_bases();
    let sink = Rc::new(MemorySink::new());
    let wft: WftController<f64> = WftController::new(WftConfig::default(), Rc::clone(&sink));
    let zero: SectorVector<f64> = SectorVector::full(sup.size());
    let ones = SectorVector::from_array(nd::Array1::<f64>::ones(sup.size()));
    for src in [&zero, &ones] {
        let mut dest: SectorVector<f64> = SectorVector::full(sup.size());
        wft.set_initial_vector(&mut dest, src, &pair, &pair, &sup).unwrap();
        assert_abs_diff_eq!(dest.norm(), 1.0, epsilon = 1e-12);
    }
    assert!(sink.contains("random vector"));
}

#[test]
fn disabled_controller_only_gives_random_vectors() {
    let (pair, sup) = dummy_bases();
    let sink = Rc::new(MemorySink::new());
    let mut wft: WftController<f64> = WftController::new(WftConfig::default(), Rc::clone(&sink));
    wft.disable();
    wft.disable();
    assert!(!wft.is_enabled());
    for stage in [Stage::Infinite, Stage::ExpandSystem, Stage::ExpandEnviron] {
        wft.set_stage(stage, CounterPolicy::ResetCounter);
        wft.push(mat(4, 4, 1.0), Direction::ExpandEnviron, &pair, &pair, &sup).unwrap();
        wft.trigger_on(&pair, &pair, &sup).unwrap();
        let mut dest: SectorVector<f64> = SectorVector::full(sup.size());
        let zero: SectorVector<f64> = SectorVector::full(sup.size());
        wft.set_initial_vector(&mut dest, &zero, &pair, &pair, &sup).unwrap();
        assert_abs_diff_eq!(dest.norm(), 1.0, epsilon = 1e-12);
        wft.trigger_off(&pair, &pair, &sup);
        assert_eq!(wft.stack_depths(), (0, 0));
        assert_eq!(wft.counter(), 0);
        assert!(wft.wave().we.is_none());
    }
    assert!(sink.lines().is_empty());
}

#[test]
fn degenerate_source_is_rejected() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    let mut src: SectorVector<f64> = SectorVector::full(sup.size());
    src[3] = 1e-9;
    let mut dest = SectorVector::from_array(nd::Array1::from_elem(sup.size(), 7.0));
    let err = wft.set_initial_vector(&mut dest, &src, &pair, &pair, &sup).unwrap_err();
    assert!(matches!(err, WftError::DegenerateInputVector(n) if n < 1e-6));
    assert!(dest.as_array().iter().all(|v| *v == 7.0));

    let srcs = [SectorVector::from_array(nd::Array1::ones(sup.size())), src];
    let mut dests = [dest.clone(), dest.clone()];
    let err = wft.set_initial_vectors(&mut dests, &srcs, &pair, &pair, &sup).unwrap_err();
    assert!(matches!(err, WftError::DegenerateInputVector(_)));
    assert!(dests.iter().all(|d| d.as_array().iter().all(|v| *v == 7.0)));
}

#[test]
fn random_vectors_have_unit_norm() {
    let wft = controller();
    for (len, start, end) in [(1, 0, 1), (16, 0, 16), (16, 5, 11), (40, 39, 40)] {
        let mut v: SectorVector<f64> = SectorVector::full(len);
        wft.create_random_vector_range(&mut v, start, end).unwrap();
        assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-12);
    }
    let (_, sup) = dummy_bases();
    let mut v: SectorVector<f64> = SectorVector::from_basis(&sup, [1, 3]).unwrap();
    wft.create_random_vector(&mut v).unwrap();
    assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-12);
}

#[test]
fn counter_policy() {
    let (pair, sup) = dummy_bases();
    let mut wft = controller();
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    wft.trigger_off(&pair, &pair, &sup);
    wft.trigger_off(&pair, &pair, &sup);
    assert_eq!(wft.counter(), 2);
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::DoNotResetCounter);
    assert_eq!(wft.counter(), 2);
    wft.set_stage(Stage::ExpandEnviron, CounterPolicy::DoNotResetCounter);
    assert_eq!(wft.counter(), 2);
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    assert_eq!(wft.counter(), 0);
    assert!(!wft.is_first_call());
}

#[test]
fn unpopulated_destination_is_rejected() {
    let (pair, sup) = dummy_bases();
    let wft = controller();
    let mut dest: SectorVector<f64>
        = SectorVector::zeros(sup.size(), Vec::<std::ops::Range<usize>>::new()).unwrap();
    dest[2] = 5.0;
    let src: SectorVector<f64> = SectorVector::full(sup.size());
    assert_eq!(
        wft.set_initial_vector(&mut dest, &src, &pair, &pair, &sup),
        Err(WftError::InvalidVector(vector::VectorError::Unpopulated)),
    );
    assert_eq!(dest[2], 5.0);
    let mut dests = [SectorVector::full(sup.size()), dest.clone()];
    assert!(wft.set_initial_vectors(&mut dests, &[src.clone(), src], &pair, &pair, &sup).is_err());
    assert_eq!(dests[0].norm(), 0.0);
}

fn amp(n: [usize; 4]) -> f64 {
    1.0 + n[0] as f64 + 2.0 * n[1] as f64 + 4.0 * n[2] as f64 + 8.0 * n[3] as f64
}

// Four sites 0..4 with non-truncating transforms, in the three configurations
// of a short sweep:
//   old  = [0] 1 | 2 [3]    (end of growth)
//   new  = [0 1] 2 | 3 []   (one step to the right)
//   back = [0] 1 | 2 [3]    (one step back to the left)
struct Lattice {
    s_old: Arc<Basis>,
    e_old: Arc<Basis>,
    se_old: Arc<Basis>,
    s_new: Arc<Basis>,
    e_new: Arc<Basis>,
    se_new: Arc<Basis>,
    s_back: Arc<Basis>,
    e_back: Arc<Basis>,
    se_back: Arc<Basis>,
}

fn lattice() -> Lattice {
    let vac = Basis::new(Vec::<usize>::new(), [0]).unwrap();
    let s_old = Arc::new(Basis::product(&site(0), &site(1)).unwrap());
    let e_old = Arc::new(Basis::product(&site(2), &site(3)).unwrap());
    let se_old = Arc::new(Basis::product(&s_old, &e_old).unwrap());
    let s_block = Basis::new([0, 1], s_old.qns().to_vec()).unwrap();
    let s_new = Arc::new(Basis::product(&s_block, &site(2)).unwrap());
    let e_new = Arc::new(Basis::product(&site(3), &vac).unwrap());
    let se_new = Arc::new(Basis::product(&s_new, &e_new).unwrap());
    let e_block = Basis::new([3], e_new.qns().to_vec()).unwrap();
    let s_back = Arc::clone(&s_old);
    let e_back = Arc::new(Basis::product(&site(2), &e_block).unwrap());
    let se_back = Arc::new(Basis::product(&s_back, &e_back).unwrap());
    Lattice { s_old, e_old, se_old, s_new, e_new, se_new, s_back, e_back, se_back }
}

// amplitudes over the configuration at the end of growth
fn grown_state(l: &Lattice) -> SectorVector<f64> {
    let mut src: SectorVector<f64> = SectorVector::full(l.se_old.size());
    for k in 0..l.se_old.size() {
        let (a, b) = l.se_old.split(k).unwrap();
        let (n0, n1) = l.s_old.split(a).unwrap();
        let (n2, n3) = l.e_old.split(b).unwrap();
        src[k] = amp([n0, n1, n2, n3]);
    }
    src
}

fn grow(wft: &mut WftController<f64>, l: &Lattice) {
    wft.init(2).unwrap();
    wft.push(eye(4), Direction::ExpandSystem, &l.s_old, &l.e_old, &l.se_old).unwrap();
    wft.push(eye(2), Direction::ExpandEnviron, &l.e_old, &l.s_old, &l.se_old).unwrap();
}

fn check_new(l: &Lattice, psi: &SectorVector<f64>) {
    for k in 0..l.se_new.size() {
        let (a, b) = l.se_new.split(k).unwrap();
        let (s, n2) = l.s_new.split(a).unwrap();
        let (n0, n1) = l.s_old.split(s).unwrap();
        let (n3, _) = l.e_new.split(b).unwrap();
        assert_abs_diff_eq!(psi[k], amp([n0, n1, n2, n3]), epsilon = 1e-12);
    }
}

#[test]
fn growth_then_sweep_step_is_exact() {
    let l = lattice();
    let sink = Rc::new(MemorySink::new());
    let mut wft: WftController<f64> = WftController::for_basis(&l.se_old, Rc::clone(&sink));
    assert_eq!(wft.symmetry(), Symmetry::Local);
    grow(&mut wft, &l);
    let src = grown_state(&l);

    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    wft.trigger_on(&l.s_new, &l.e_new, &l.se_new).unwrap();
    let mut dest: SectorVector<f64> = SectorVector::full(l.se_new.size());
    wft.set_initial_vector(&mut dest, &src, &l.s_new, &l.e_new, &l.se_new).unwrap();
    wft.trigger_off(&l.s_new, &l.e_new, &l.se_new);

    check_new(&l, &dest);
    assert_abs_diff_eq!(dest.norm(), src.norm(), epsilon = 1e-12);
    assert_eq!(wft.counter(), 1);
    assert!(Arc::ptr_eq(wft.wave().super_block.as_ref().unwrap(), &l.se_new));
    assert!(sink.contains("transformation completed"));
}

#[test]
fn sweep_turn_uses_history_below_top() {
    let l = lattice();
    let mut wft = controller();
    grow(&mut wft, &l);
    let src = grown_state(&l);

    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    wft.trigger_on(&l.s_new, &l.e_new, &l.se_new).unwrap();
    let mut psi: SectorVector<f64> = SectorVector::full(l.se_new.size());
    wft.set_initial_vector(&mut psi, &src, &l.s_new, &l.e_new, &l.se_new).unwrap();
    wft.trigger_off(&l.s_new, &l.e_new, &l.se_new);
    check_new(&l, &psi);
    let last = eye(8);
    wft.push(last.clone(), Direction::ExpandSystem, &l.s_new, &l.e_new, &l.se_new).unwrap();
    assert_eq!(wft.stack_depths(), (2, 0));

    wft.set_stage(Stage::ExpandEnviron, CounterPolicy::ResetCounter);
    wft.trigger_on(&l.s_back, &l.e_back, &l.se_back).unwrap();
    assert_eq!(wft.stack_depths(), (1, 0));
    let ws = wft.wave().ws.as_ref().unwrap();
    assert!(!ws.ptr_eq(&last));
    assert_eq!((ws.n_new(), ws.n_old()), (4, 4));
    let we = wft.wave().we.as_ref().unwrap();
    assert_eq!((we.n_new(), we.n_old()), (2, 2));

    let mut dest: SectorVector<f64> = SectorVector::full(l.se_back.size());
    wft.set_initial_vector(&mut dest, &psi, &l.s_back, &l.e_back, &l.se_back).unwrap();
    wft.trigger_off(&l.s_back, &l.e_back, &l.se_back);
    for k in 0..l.se_back.size() {
        let (a, b) = l.se_back.split(k).unwrap();
        let (n0, n1) = l.s_back.split(a).unwrap();
        let (n2, e) = l.e_back.split(b).unwrap();
        let (n3, _) = l.e_new.split(e).unwrap();
        assert_abs_diff_eq!(dest[k], amp([n0, n1, n2, n3]), epsilon = 1e-12);
    }
    assert_abs_diff_eq!(dest.norm(), src.norm(), epsilon = 1e-12);
    assert_eq!(wft.counter(), 1);
}

#[test]
fn batch_failure_leaves_every_destination_untouched() {
    let l = lattice();
    let mut wft = controller();
    grow(&mut wft, &l);
    let src = grown_state(&l);
    wft.set_stage(Stage::ExpandSystem, CounterPolicy::ResetCounter);
    wft.trigger_on(&l.s_new, &l.e_new, &l.se_new).unwrap();

    let srcs = [src.clone(), src];
    let mut dests = [
        SectorVector::from_array(nd::Array1::from_elem(l.se_new.size(), 7.0)),
        SectorVector::from_array(nd::Array1::from_elem(10, 7.0)),
    ];
    let err = wft.set_initial_vectors(&mut dests, &srcs, &l.s_new, &l.e_new, &l.se_new)
        .unwrap_err();
    assert!(matches!(
        err,
        WftError::Transform(transform::TransformError::DimensionMismatch {
            what: "destination vector", ..
        })
    ));
    assert!(dests.iter().all(|d| d.as_array().iter().all(|v| *v == 7.0)));

    let mut dests = [
        SectorVector::full(l.se_new.size()),
        SectorVector::full(l.se_new.size()),
    ];
    wft.set_initial_vectors(&mut dests, &srcs, &l.s_new, &l.e_new, &l.se_new).unwrap();
    dests.iter().for_each(|psi| check_new(&l, psi));
}
