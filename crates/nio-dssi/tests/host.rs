//! Drives the plugin the way a DSSI host does: through the descriptors'
//! function pointers only.

use std::ffi::{c_ulong, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nio_dssi::ffi::{snd_seq_event_t, DSSI_NONE};
use nio_dssi::{dssi_descriptor, register_factory, Middleware, Synth, PORT_CONTROLS};

static SELECTIONS: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());

/// Outputs the number of notes held
struct Counter {
    held: usize,
}

impl Synth for Counter {
    fn render_into(&mut self, left: &mut [f32], right: &mut [f32], _sample_rate: u32) {
        left.fill(self.held as f32);
        right.fill(self.held as f32);
    }

    fn note_on(&mut self, _channel: u8, _note: u8, _velocity: u8) {
        self.held += 1;
    }

    fn note_off(&mut self, _channel: u8, _note: u8) {
        self.held = self.held.saturating_sub(1);
    }

    fn set_controller(&mut self, _channel: u8, _controller: i32, _value: i32) {}
}

struct Library {
    ticks: AtomicUsize,
}

impl Middleware for Library {
    fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn rescan_banks(&self) {}

    fn bank_count(&self) -> usize {
        3
    }

    fn load_bank(&self, bank: usize) -> Option<Vec<String>> {
        match bank {
            0 => Some(vec![String::new(); 4]),
            1 => Some(vec!["Strings".into(), " spare".into(), "Brass".into()]),
            _ => None,
        }
    }

    fn pending_set_bank(&self, bank: usize) {
        SELECTIONS.lock().unwrap().push((bank, usize::MAX));
    }

    fn pending_set_program(&self, _part: usize, program: usize) {
        if let Some(last) = SELECTIONS.lock().unwrap().last_mut() {
            last.1 = program;
        }
    }
}

fn make_synth(_sample_rate: u32) -> anyhow::Result<(Box<dyn Synth>, Arc<dyn Middleware>)> {
    let middleware: Arc<dyn Middleware> = Arc::new(Library {
        ticks: AtomicUsize::new(0),
    });
    Ok((Box::new(Counter { held: 0 }), middleware))
}

#[test]
fn test_host_session() {
    let _ = env_logger::builder().is_test(true).try_init();
    // A second registration is rejected
    register_factory(make_synth).unwrap();
    assert!(register_factory(make_synth).is_err());

    let dssi = unsafe { &*dssi_descriptor(0) };
    let ladspa = unsafe { &*dssi.LADSPA_Plugin };
    assert_eq!(unsafe { CStr::from_ptr(ladspa.Name) }, c"ZynAddSubFX");

    unsafe {
        let instantiate = ladspa.instantiate.unwrap();
        let handle = instantiate(ladspa, 44100);
        assert!(!handle.is_null());

        let mut left = vec![-1.0f32; 256];
        let mut right = vec![-1.0f32; 256];
        let mut volume = 100.0f32;
        let connect = ladspa.connect_port.unwrap();
        connect(handle, 0, left.as_mut_ptr());
        connect(handle, 1, right.as_mut_ptr());
        connect(handle, PORT_CONTROLS as c_ulong + 1, &mut volume);
        // Beyond the last port: ignored
        connect(handle, 99, &mut volume);

        (ladspa.activate.unwrap())(handle);

        let mut events = [
            snd_seq_event_t::note_on(0, 0, 60, 100),
            snd_seq_event_t::note_on(100, 0, 64, 100),
            snd_seq_event_t::note_off(200, 0, 60),
        ];
        (dssi.run_synth.unwrap())(handle, 256, events.as_mut_ptr(), events.len() as c_ulong);
        assert!(left[..100].iter().all(|&s| s == 1.0));
        assert!(left[100..200].iter().all(|&s| s == 2.0));
        assert!(right[200..].iter().all(|&s| s == 1.0));

        // Plain LADSPA run keeps the held note
        (ladspa.run.unwrap())(handle, 64);
        assert!(left[..64].iter().all(|&s| s == 1.0));

        let get_program = dssi.get_program.unwrap();
        let first = &*get_program(handle, 0);
        assert_eq!((first.Bank, first.Program), (1, 0));
        assert_eq!(CStr::from_ptr(first.Name), c"Strings");
        let second = &*get_program(handle, 1);
        assert_eq!((second.Bank, second.Program), (1, 2));
        assert!(get_program(handle, 2).is_null());

        (dssi.select_program.unwrap())(handle, 1, 2);
        (dssi.select_program.unwrap())(handle, 7, 0);
        assert_eq!(*SELECTIONS.lock().unwrap(), vec![(1, 2)]);

        assert_eq!(
            (dssi.get_midi_controller_for_port.unwrap())(handle, PORT_CONTROLS as c_ulong),
            DSSI_NONE
        );

        (ladspa.deactivate.unwrap())(handle);
        (ladspa.cleanup.unwrap())(handle);
    }
}

#[test]
fn test_null_handles_are_ignored() {
    let dssi = unsafe { &*dssi_descriptor(0) };
    let ladspa = unsafe { &*dssi.LADSPA_Plugin };
    unsafe {
        (ladspa.run.unwrap())(std::ptr::null_mut(), 64);
        (ladspa.cleanup.unwrap())(std::ptr::null_mut());
        assert!((dssi.get_program.unwrap())(std::ptr::null_mut(), 0).is_null());
        assert!((ladspa.instantiate.unwrap())(std::ptr::null(), 48000).is_null());
    }
}
